use async_trait::async_trait;

use crate::core::launch::message::MessageLevel;
use crate::core::launch::step::{LaunchStep, StepContext, StepOutcome};

/// Prints fixed lines into the log.
pub struct TextPrint {
    lines: Vec<String>,
    level: MessageLevel,
}

impl TextPrint {
    pub fn new(lines: Vec<String>, level: MessageLevel) -> Self {
        Self { lines, level }
    }

    pub fn line(line: impl Into<String>, level: MessageLevel) -> Self {
        Self::new(vec![line.into()], level)
    }
}

#[async_trait]
impl LaunchStep for TextPrint {
    fn name(&self) -> &str {
        "TextPrint"
    }

    fn can_abort(&self) -> bool {
        true
    }

    async fn execute(&mut self, ctx: &StepContext) -> StepOutcome {
        ctx.log_lines(self.lines.iter().cloned(), self.level);
        StepOutcome::Succeeded
    }
}
