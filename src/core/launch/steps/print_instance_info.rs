use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::core::instance::{AuthSession, MinecraftInstance, ServerTarget};
use crate::core::launch::message::MessageLevel;
use crate::core::launch::step::{LaunchStep, StepContext, StepOutcome};

/// Logs the host and the resolved launch configuration once the instance is up to date.
pub struct PrintInstanceInfo {
    instance: Arc<MinecraftInstance>,
    session: AuthSession,
    server: Arc<Mutex<Option<ServerTarget>>>,
}

impl PrintInstanceInfo {
    pub fn new(
        instance: Arc<MinecraftInstance>,
        session: AuthSession,
        server: Arc<Mutex<Option<ServerTarget>>>,
    ) -> Self {
        Self {
            instance,
            session,
            server,
        }
    }
}

fn system_description() -> Vec<String> {
    let mut system = sysinfo::System::new_all();
    system.refresh_all();
    let cpu = system
        .cpus()
        .first()
        .map(|cpu| cpu.brand().trim().to_string())
        .unwrap_or_default();
    vec![
        format!(
            "OS: {} {}",
            sysinfo::System::name().unwrap_or_default(),
            sysinfo::System::os_version().unwrap_or_default()
        ),
        format!("CPU: {} ({} threads)", cpu, system.cpus().len()),
        format!("Memory: {} MiB", system.total_memory() / (1024 * 1024)),
        String::new(),
    ]
}

#[async_trait]
impl LaunchStep for PrintInstanceInfo {
    fn name(&self) -> &str {
        "PrintInstanceInfo"
    }

    async fn execute(&mut self, ctx: &StepContext) -> StepOutcome {
        let server = match self.server.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };

        let system = tokio::task::spawn_blocking(system_description)
            .await
            .unwrap_or_default();
        ctx.log_lines(system, MessageLevel::Launcher);

        match self
            .instance
            .verbose_description(Some(&self.session), server.as_ref())
        {
            Ok(lines) => {
                ctx.log_lines(lines, MessageLevel::Launcher);
                StepOutcome::Succeeded
            }
            Err(e) => StepOutcome::failed(format!("Couldn't describe the instance: {}", e)),
        }
    }
}
