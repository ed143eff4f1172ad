// ─── Check Java ───
// Resolves the configured Java binary and probes it when it changed since the last launch.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use async_trait::async_trait;
use tracing::debug;

use crate::core::error::LauncherResult;
use crate::core::java::{find_executable, JavaCheckValidity, JavaChecker};
use crate::core::launch::message::MessageLevel;
use crate::core::launch::step::{LaunchStep, StepContext, StepOutcome};
use crate::core::settings::SettingsObject;

const DEFAULT_CHECK_TIMEOUT_MS: i64 = 15_000;

pub struct CheckJava {
    settings: Arc<SettingsObject>,
    per_instance: bool,
}

impl CheckJava {
    /// `per_instance` selects the hint shown when the binary is missing.
    pub fn new(settings: Arc<SettingsObject>, per_instance: bool) -> Self {
        Self { settings, per_instance }
    }

    fn stored(&self, id: &str) -> String {
        self.settings.get_string(id).unwrap_or_default()
    }

    fn print_java_info(&self, ctx: &StepContext, version: &str, architecture: &str, vendor: &str) {
        ctx.log(
            format!(
                "Java is version {}, using {}-bit architecture, from {}.\n\n",
                version, architecture, vendor
            ),
            MessageLevel::Launcher,
        );
        if cfg!(target_pointer_width = "64") && architecture == "32" {
            ctx.log(
                "Your Java architecture is not matching your system architecture. You might want to install a 64bit Java version.\n\n",
                MessageLevel::Error,
            );
        }
    }

    fn store_result(&self, version: &str, architecture: &str, real_arch: &str, vendor: &str, timestamp: i64) -> LauncherResult<()> {
        self.settings.set("JavaVersion", version)?;
        self.settings.set("JavaArchitecture", architecture)?;
        self.settings.set("JavaRealArchitecture", real_arch)?;
        self.settings.set("JavaVendor", vendor)?;
        self.settings.set("JavaTimestamp", timestamp)
    }
}

fn modified_millis(path: &Path) -> i64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[async_trait]
impl LaunchStep for CheckJava {
    fn name(&self) -> &str {
        "CheckJava"
    }

    async fn execute(&mut self, ctx: &StepContext) -> StepOutcome {
        let java_path = self.stored("JavaPath");
        let Some(real_path) = find_executable(java_path.trim()) else {
            let hint = if self.per_instance {
                "Please fix the java path override in the instance's settings or disable it."
            } else {
                "Please set up java in the settings."
            };
            ctx.log(
                format!("The java binary \"{}\" couldn't be found. {}", java_path, hint),
                MessageLevel::Warning,
            );
            return StepOutcome::failed("Java path is not valid.");
        };
        ctx.log(format!("Java path is:\n{}\n\n", java_path), MessageLevel::Launcher);

        let timestamp = modified_millis(&real_path);
        let stored_timestamp = self.settings.get_int("JavaTimestamp").unwrap_or(0);
        let version = self.stored("JavaVersion");
        let architecture = self.stored("JavaArchitecture");
        let vendor = self.stored("JavaVendor");

        if timestamp == stored_timestamp && !version.is_empty() && !architecture.is_empty() && !vendor.is_empty() {
            debug!("Java at {:?} unchanged, skipping probe", real_path);
            self.print_java_info(ctx, &version, &architecture, &vendor);
            return StepOutcome::Succeeded;
        }

        ctx.log("Checking Java version...", MessageLevel::Launcher);
        let timeout_ms = self
            .settings
            .get_int("JavaCheckTimeoutMs")
            .unwrap_or(DEFAULT_CHECK_TIMEOUT_MS)
            .max(1) as u64;
        let result = JavaChecker::check(&real_path, Duration::from_millis(timeout_ms)).await;

        match result.validity {
            JavaCheckValidity::Errored => {
                ctx.log("Could not start java:", MessageLevel::Error);
                ctx.log_lines(result.error_log.lines().map(str::to_string), MessageLevel::Error);
                ctx.log("\nCheck your Java settings.", MessageLevel::Launcher);
                StepOutcome::failed("Could not start java!")
            }
            JavaCheckValidity::ReturnedInvalidData => {
                ctx.log(
                    "Java checker returned some invalid data we don't understand:",
                    MessageLevel::Error,
                );
                ctx.log_lines(result.out_log.lines().map(str::to_string), MessageLevel::Warning);
                ctx.log("\nMinecraft might not start properly.", MessageLevel::Launcher);
                StepOutcome::Succeeded
            }
            JavaCheckValidity::Valid => {
                let version = result.java_version.to_string();
                self.print_java_info(ctx, &version, &result.mojang_platform, &result.vendor);
                if let Err(e) = self.store_result(
                    &version,
                    &result.mojang_platform,
                    &result.real_platform,
                    &result.vendor,
                    timestamp,
                ) {
                    ctx.log(format!("Could not store the Java check result: {}", e), MessageLevel::Warning);
                }
                StepOutcome::Succeeded
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::launch::task::{LaunchTask, TaskOutcome};

    fn java_settings(path: &str) -> Arc<SettingsObject> {
        let settings = SettingsObject::new();
        settings.register_setting("JavaPath", path);
        for id in ["JavaVersion", "JavaArchitecture", "JavaRealArchitecture", "JavaVendor"] {
            settings.register_setting(id, "");
        }
        settings.register_setting("JavaTimestamp", 0_i64);
        settings.register_setting("JavaCheckTimeoutMs", 1000_i64);
        Arc::new(settings)
    }

    #[tokio::test]
    async fn missing_binary_fails() {
        let (mut task, _rx) = LaunchTask::new();
        task.append_step(Box::new(CheckJava::new(java_settings("/nonexistent/java"), false)));
        assert_eq!(
            task.run().await,
            TaskOutcome::Failed {
                reason: "Java path is not valid.".to_string(),
                fatal: true
            }
        );
    }

    #[tokio::test]
    async fn cached_probe_is_reused() {
        let dir = std::env::temp_dir().join(format!("pl_check_java_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let java = dir.join("java");
        std::fs::write(&java, b"not a real java").unwrap();

        let settings = java_settings(java.to_str().unwrap());
        settings.set("JavaVersion", "17.0.2").unwrap();
        settings.set("JavaArchitecture", "64").unwrap();
        settings.set("JavaVendor", "Eclipse Adoptium").unwrap();
        settings.set("JavaTimestamp", modified_millis(&java)).unwrap();

        let (mut task, _rx) = LaunchTask::new();
        task.append_step(Box::new(CheckJava::new(settings, true)));
        assert_eq!(task.run().await, TaskOutcome::Succeeded);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
