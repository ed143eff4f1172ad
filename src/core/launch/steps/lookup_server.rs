use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::warn;

use crate::core::instance::{ServerResolver, ServerTarget, DEFAULT_SERVER_PORT};
use crate::core::launch::message::MessageLevel;
use crate::core::launch::step::{LaunchStep, StepContext, StepOutcome};

/// Resolves the server to join. Lookup failures fall back to the literal address.
pub struct LookupServerAddress {
    lookup_address: String,
    output: Arc<Mutex<Option<ServerTarget>>>,
    resolver: Arc<dyn ServerResolver>,
}

impl LookupServerAddress {
    pub fn new(
        lookup_address: impl Into<String>,
        output: Arc<Mutex<Option<ServerTarget>>>,
        resolver: Arc<dyn ServerResolver>,
    ) -> Self {
        Self {
            lookup_address: lookup_address.into(),
            output,
            resolver,
        }
    }

    fn store(&self, target: ServerTarget) {
        let mut slot = match self.output.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(target);
    }
}

#[async_trait]
impl LaunchStep for LookupServerAddress {
    fn name(&self) -> &str {
        "LookupServerAddress"
    }

    fn can_abort(&self) -> bool {
        true
    }

    async fn execute(&mut self, ctx: &StepContext) -> StepOutcome {
        ctx.log(
            format!("Resolving server address {}...", self.lookup_address),
            MessageLevel::Launcher,
        );
        let fallback = ServerTarget::new(self.lookup_address.clone(), DEFAULT_SERVER_PORT);

        let resolved = tokio::select! {
            _ = ctx.aborted() => return StepOutcome::Aborted,
            result = self.resolver.resolve(&self.lookup_address) => result,
        };

        match resolved {
            Ok(Some(target)) => {
                ctx.log(
                    format!("Resolved server address {} to {}", self.lookup_address, target),
                    MessageLevel::Launcher,
                );
                self.store(target);
            }
            Ok(None) => {
                ctx.log(
                    format!("No records for {}, using {} as is", self.lookup_address, fallback),
                    MessageLevel::Warning,
                );
                self.store(fallback);
            }
            Err(e) => {
                warn!("Server lookup failed: {}", e);
                ctx.log(
                    format!("Failed to resolve server address ({}). Using {} as is", e, fallback),
                    MessageLevel::Warning,
                );
                self.store(fallback);
            }
        }
        StepOutcome::Succeeded
    }
}
