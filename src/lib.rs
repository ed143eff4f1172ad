pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::error::{LauncherError, LauncherResult};
pub use crate::core::instance::{register_global_settings, AuthSession, MinecraftInstance, ServerTarget};
pub use crate::core::launch::{LaunchEvent, LaunchHandle, LaunchTask, MessageLevel, TaskOutcome};
pub use crate::core::profile::{ComponentList, LaunchProfile};
pub use crate::core::settings::SettingsObject;

/// Install the default structured logger. Calling it twice is harmless.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,profile_launch=debug")),
        )
        .try_init();
}
