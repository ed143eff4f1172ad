// ─── Runtime Context ───
// The OS / architecture / Java tuple that rules and native classifiers are evaluated against.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeContext {
    /// Mojang OS name: `windows`, `osx`, `linux`, ...
    pub system: String,
    /// `"32"` or `"64"`, as reported by the Java checker.
    pub java_architecture: String,
    /// Raw `os.arch` of the Java runtime (`amd64`, `aarch64`, ...).
    pub java_real_architecture: String,
    /// OS version string matched by `os.version` rule patterns.
    #[serde(default)]
    pub os_version: String,
}

impl RuntimeContext {
    pub fn new(system: &str, java_architecture: &str, java_real_architecture: &str) -> Self {
        Self {
            system: system.to_string(),
            java_architecture: java_architecture.to_string(),
            java_real_architecture: java_real_architecture.to_string(),
            os_version: String::new(),
        }
    }

    pub fn with_os_version(mut self, os_version: &str) -> Self {
        self.os_version = os_version.to_string();
        self
    }

    /// Context for the machine we are running on, assuming a Java runtime of the same width.
    pub fn current() -> Self {
        let java_architecture = if cfg!(target_pointer_width = "64") {
            "64"
        } else {
            "32"
        };
        Self {
            system: current_system().to_string(),
            java_architecture: java_architecture.to_string(),
            java_real_architecture: std::env::consts::ARCH.to_string(),
            os_version: sysinfo::System::os_version().unwrap_or_default(),
        }
    }

    /// Update the Java half of the context from a checker result.
    pub fn set_java(&mut self, java_architecture: &str, java_real_architecture: &str) {
        if !java_architecture.is_empty() {
            self.java_architecture = java_architecture.to_string();
        }
        if !java_real_architecture.is_empty() {
            self.java_real_architecture = java_real_architecture.to_string();
        }
    }

    pub fn mapped_java_real_architecture(&self) -> &str {
        match self.java_real_architecture.as_str() {
            "amd64" => "x86_64",
            "i386" | "i686" => "x86",
            "aarch64" => "arm64",
            "arm" => "arm32",
            other => other,
        }
    }

    /// Precise classifier key, `os-arch`.
    pub fn classifier(&self) -> String {
        format!("{}-{}", self.system, self.mapped_java_real_architecture())
    }

    /// Mojang metadata predates ARM; plain `os` keys only ever meant x86.
    pub fn is_legacy_arch(&self) -> bool {
        matches!(self.mapped_java_real_architecture(), "x86_64" | "x86")
    }

    pub fn classifier_matches(&self, target: &str) -> bool {
        target == self.classifier() || (self.is_legacy_arch() && target == self.system)
    }
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self::current()
    }
}

/// Mojang OS name for the current platform.
pub fn current_system() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "osx"
    } else if cfg!(target_os = "freebsd") {
        "freebsd"
    } else {
        "linux"
    }
}
