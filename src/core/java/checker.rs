// ─── Java Checker ───
// Probes a Java binary for its version, vendor and bitness by running
// `java -XshowSettings:properties -version` with a bounded wait.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, instrument, warn};

use super::version::JavaVersion;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JavaCheckValidity {
    Valid,
    ReturnedInvalidData,
    Errored,
}

#[derive(Debug, Clone)]
pub struct JavaCheckResult {
    pub path: PathBuf,
    pub validity: JavaCheckValidity,
    pub java_version: JavaVersion,
    /// `"32"` or `"64"`.
    pub mojang_platform: String,
    /// `os.arch` as reported by the JVM.
    pub real_platform: String,
    pub vendor: String,
    pub out_log: String,
    pub error_log: String,
}

impl JavaCheckResult {
    fn errored(path: &Path, error_log: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            validity: JavaCheckValidity::Errored,
            java_version: JavaVersion::default(),
            mojang_platform: String::new(),
            real_platform: String::new(),
            vendor: String::new(),
            out_log: String::new(),
            error_log: error_log.into(),
        }
    }
}

pub struct JavaChecker;

impl JavaChecker {
    /// Run the probe, killing the JVM once `timeout` elapses.
    #[instrument(skip(timeout))]
    pub async fn check(path: &Path, timeout: Duration) -> JavaCheckResult {
        let mut child = match Command::new(path)
            .args(["-XshowSettings:properties", "-version"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return JavaCheckResult::errored(path, e.to_string()),
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let read_all = async {
            use tokio::io::AsyncReadExt;
            let mut out = String::new();
            let mut err = String::new();
            if let Some(mut s) = stdout {
                let _ = s.read_to_string(&mut out).await;
            }
            if let Some(mut s) = stderr {
                let _ = s.read_to_string(&mut err).await;
            }
            let status = child.wait().await;
            (status, out, err)
        };

        let (status, out, err) = match tokio::time::timeout(timeout, read_all).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Java checker for {:?} timed out after {:?}", path, timeout);
                // Dropping the future drops the child, which kills it.
                return JavaCheckResult::errored(path, "Java checker timed out");
            }
        };

        match status {
            Ok(status) if status.success() => parse_output(path, out, err),
            Ok(status) => {
                let mut result = JavaCheckResult::errored(path, err);
                result.out_log = out;
                debug!("Java checker exited with {}", status);
                result
            }
            Err(e) => JavaCheckResult::errored(path, e.to_string()),
        }
    }
}

fn parse_output(path: &Path, out: String, err: String) -> JavaCheckResult {
    // Properties go to stderr on every JVM we know of, the version banner too.
    let combined = format!("{}\n{}", err, out);
    let properties = parse_properties(&combined);

    let mut result = JavaCheckResult {
        path: path.to_path_buf(),
        validity: JavaCheckValidity::ReturnedInvalidData,
        java_version: JavaVersion::default(),
        mojang_platform: String::new(),
        real_platform: String::new(),
        vendor: String::new(),
        out_log: combined.clone(),
        error_log: String::new(),
    };

    let (Some(version), Some(os_arch)) = (properties.get("java.version"), properties.get("os.arch")) else {
        return result;
    };

    let bitness = properties
        .get("sun.arch.data.model")
        .cloned()
        .unwrap_or_else(|| match os_arch.as_str() {
            "amd64" | "x86_64" | "aarch64" | "ppc64le" => "64".to_string(),
            _ => "32".to_string(),
        });

    result.validity = JavaCheckValidity::Valid;
    result.java_version = JavaVersion::parse(version);
    result.mojang_platform = bitness;
    result.real_platform = os_arch.clone();
    result.vendor = properties
        .get("java.vendor")
        .cloned()
        .unwrap_or_else(|| "unknown".to_string());
    result
}

fn parse_properties(output: &str) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    for line in output.lines() {
        if let Some((key, value)) = line.split_once(" = ") {
            let key = key.trim();
            if !key.is_empty() && !key.contains(' ') {
                properties.insert(key.to_string(), value.trim().to_string());
            }
        }
    }
    properties
}

/// Resolve a configured Java path like a shell would.
pub fn find_executable(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .flat_map(|dir| {
            let plain = dir.join(program);
            let exe = dir.join(format!("{}.exe", program));
            [plain, exe]
        })
        .find(|path| path.is_file())
}
