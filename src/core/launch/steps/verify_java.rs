use std::sync::Arc;

use async_trait::async_trait;

use crate::core::instance::MinecraftInstance;
use crate::core::java::JavaVersion;
use crate::core::launch::message::MessageLevel;
use crate::core::launch::step::{LaunchStep, StepContext, StepOutcome};

/// Whether `java` satisfies the profile's compatible majors. No list means anything goes.
pub fn is_compatible_java(compatible_majors: &[u32], java: &JavaVersion) -> bool {
    compatible_majors.is_empty() || compatible_majors.contains(&java.major)
}

/// Refuses to launch on a Java major the profile does not list, unless the user opted out.
pub struct VerifyJavaInstall {
    instance: Arc<MinecraftInstance>,
}

impl VerifyJavaInstall {
    pub fn new(instance: Arc<MinecraftInstance>) -> Self {
        Self { instance }
    }
}

#[async_trait]
impl LaunchStep for VerifyJavaInstall {
    fn name(&self) -> &str {
        "VerifyJavaInstall"
    }

    async fn execute(&mut self, ctx: &StepContext) -> StepOutcome {
        let profile = match self.instance.profile() {
            Ok(profile) => profile,
            Err(e) => return StepOutcome::failed(format!("Couldn't load the instance profile: {}", e)),
        };
        let java = self.instance.java_version();
        let majors = profile.get_compatible_java_majors();

        if is_compatible_java(majors, &java) {
            return StepOutcome::Succeeded;
        }
        let ignore = self
            .instance
            .settings()
            .get_bool("IgnoreJavaCompatibility")
            .unwrap_or(false);
        if ignore {
            ctx.log(
                format!("Java {} is not listed as compatible, launching anyway.", java),
                MessageLevel::Warning,
            );
            return StepOutcome::Succeeded;
        }

        ctx.log(
            format!(
                "This instance is not compatible with Java version {}.\nPlease switch to one of the following Java versions for this instance:",
                java.major
            ),
            MessageLevel::Error,
        );
        ctx.log_lines(
            majors.iter().map(|major| format!("Java version {}", major)),
            MessageLevel::Error,
        );
        ctx.log(
            "Go to instance Java settings to change your Java version or disable the Java compatibility check if you know what you're doing.",
            MessageLevel::Error,
        );
        StepOutcome::failed("Incompatible Java major version")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compatibility_by_major() {
        assert!(is_compatible_java(&[], &JavaVersion::parse("1.8.0_51")));
        assert!(is_compatible_java(&[8], &JavaVersion::parse("1.8.0_51")));
        assert!(is_compatible_java(&[17, 21], &JavaVersion::parse("21.0.1")));
        assert!(!is_compatible_java(&[17, 21], &JavaVersion::parse("1.8.0_51")));
    }
}
