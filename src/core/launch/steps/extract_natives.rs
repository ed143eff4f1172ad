// ─── Extract Natives ───
// Unpacks the profile's native jars into the instance `natives/` folder.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::MinecraftInstance;
use crate::core::launch::message::MessageLevel;
use crate::core::launch::step::{LaunchStep, StepContext, StepOutcome};
use crate::core::library::ApplicableFiles;

/// Which bundled natives to leave out because the system copy is used instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeSkips {
    pub openal: bool,
    pub glfw: bool,
}

impl NativeSkips {
    fn skips(&self, file_name: &str) -> bool {
        let lower = file_name.to_ascii_lowercase();
        (self.openal && lower.contains("openal")) || (self.glfw && lower.contains("glfw"))
    }
}

/// One native jar and the path prefixes its library excludes from extraction.
#[derive(Debug, Clone)]
pub struct NativeJar {
    pub path: PathBuf,
    pub excludes: Vec<String>,
}

/// Extract every file of `jar` into `dest`, except `META-INF`, excluded prefixes and
/// skipped natives. Returns the number of files written.
pub fn extract_native_jar(jar: &NativeJar, dest: &Path, skips: NativeSkips) -> LauncherResult<usize> {
    let file = File::open(&jar.path).map_err(|e| LauncherError::io(&jar.path, e))?;
    let mut archive = ZipArchive::new(file)?;
    let mut written = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();
        if entry.is_dir()
            || name.starts_with("META-INF")
            || jar.excludes.iter().any(|prefix| name.starts_with(prefix.as_str()))
        {
            continue;
        }
        let file_name = name.rsplit('/').next().unwrap_or(&name);
        if skips.skips(file_name) {
            debug!("Skipping bundled native {}", name);
            continue;
        }
        let Some(relative) = entry.enclosed_name() else {
            warn!("Refusing to extract {:?} from {:?}", name, jar.path);
            continue;
        };

        let target = dest.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        let mut out = File::create(&target).map_err(|e| LauncherError::io(&target, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| LauncherError::io(&target, e))?;
        written += 1;
    }
    Ok(written)
}

pub struct ExtractNatives {
    instance: Arc<MinecraftInstance>,
}

impl ExtractNatives {
    pub fn new(instance: Arc<MinecraftInstance>) -> Self {
        Self { instance }
    }

    fn native_jars(&self) -> LauncherResult<Vec<NativeJar>> {
        let profile = self.instance.profile()?;
        let ctx = self.instance.runtime_context();
        let local = self.instance.local_library_path();

        let mut jars = Vec::new();
        for lib in profile.get_native_libraries() {
            let mut files = ApplicableFiles::default();
            lib.get_applicable_files(&ctx, &mut files, Some(&local), self.instance.data_root());
            let mut paths = files.native;
            match ctx.java_architecture.as_str() {
                "32" => paths.extend(files.native32),
                "64" => paths.extend(files.native64),
                _ => {}
            }
            jars.extend(paths.into_iter().map(|path| NativeJar {
                path,
                excludes: lib.extract_excludes.clone(),
            }));
        }
        Ok(jars)
    }
}

#[async_trait]
impl LaunchStep for ExtractNatives {
    fn name(&self) -> &str {
        "ExtractNatives"
    }

    async fn execute(&mut self, ctx: &StepContext) -> StepOutcome {
        let jars = match self.native_jars() {
            Ok(jars) => jars,
            Err(e) => return StepOutcome::failed(format!("Couldn't resolve native libraries: {}", e)),
        };
        if jars.is_empty() {
            return StepOutcome::Succeeded;
        }

        let settings = self.instance.settings();
        let skips = NativeSkips {
            openal: settings.get_bool("UseNativeOpenAL").unwrap_or(false),
            glfw: settings.get_bool("UseNativeGLFW").unwrap_or(false),
        };
        let natives_dir = self.instance.natives_dir();

        // Clean previous session
        if natives_dir.exists() {
            let _ = tokio::fs::remove_dir_all(&natives_dir).await;
        }
        if let Err(e) = tokio::fs::create_dir_all(&natives_dir).await {
            return StepOutcome::failed(format!("Couldn't create the natives folder: {}", e));
        }

        let dest = natives_dir.clone();
        let extracted = tokio::task::spawn_blocking(move || {
            let mut total = 0;
            for jar in &jars {
                total += extract_native_jar(jar, &dest, skips).map_err(|e| {
                    format!(
                        "Couldn't extract native jar '{}' to destination '{}': {}",
                        jar.path.display(),
                        dest.display(),
                        e
                    )
                })?;
            }
            Ok::<usize, String>(total)
        })
        .await;

        match extracted {
            Ok(Ok(total)) => {
                debug!("Extracted {} native files into {:?}", total, natives_dir);
                StepOutcome::Succeeded
            }
            Ok(Err(reason)) => {
                ctx.log(reason.clone(), MessageLevel::Fatal);
                StepOutcome::Failed(reason)
            }
            Err(e) => StepOutcome::failed(format!("Native extraction stopped: {}", e)),
        }
    }

    async fn finalize(&mut self, _ctx: &StepContext) {
        let natives_dir = self.instance.natives_dir();
        if natives_dir.exists() {
            let _ = tokio::fs::remove_dir_all(&natives_dir).await;
        }
    }
}
