mod checker;
mod version;

pub use checker::{find_executable, JavaCheckResult, JavaCheckValidity, JavaChecker};
pub use version::JavaVersion;
