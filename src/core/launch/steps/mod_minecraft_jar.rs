// ─── Mod Minecraft Jar ───
// Merges the profile's jar mods over the main jar into `bin/minecraft.jar`.

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use zip::{ZipArchive, ZipWriter};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::MinecraftInstance;
use crate::core::launch::message::MessageLevel;
use crate::core::launch::step::{LaunchStep, StepContext, StepOutcome};
use crate::core::library::ApplicableFiles;

pub struct ModMinecraftJar {
    instance: Arc<MinecraftInstance>,
}

impl ModMinecraftJar {
    pub fn new(instance: Arc<MinecraftInstance>) -> Self {
        Self { instance }
    }

    fn final_jar(&self) -> PathBuf {
        self.instance.bin_root().join("minecraft.jar")
    }

    fn remove_final_jar(&self) -> std::io::Result<()> {
        match std::fs::remove_file(self.final_jar()) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Main jar and jar mod archives, in application order.
    fn inputs(&self) -> LauncherResult<Option<(PathBuf, Vec<PathBuf>)>> {
        let profile = self.instance.profile()?;
        if profile.get_jar_mods().is_empty() {
            return Ok(None);
        }
        let ctx = self.instance.runtime_context();
        let storage_root = self.instance.data_root();

        let mut main = ApplicableFiles::default();
        if let Some(main_jar) = profile.get_main_jar() {
            main_jar.get_applicable_files(&ctx, &mut main, None, storage_root);
        }
        let base = main
            .jar
            .into_iter()
            .next()
            .ok_or_else(|| LauncherError::Other("The profile has no main jar to apply jar mods to".into()))?;

        let jar_mods_dir = self.instance.jar_mods_dir();
        let mut mods = ApplicableFiles::default();
        for jar_mod in profile.get_jar_mods() {
            jar_mod.get_applicable_files(&ctx, &mut mods, Some(&jar_mods_dir), storage_root);
        }
        Ok(Some((base, mods.jar)))
    }
}

/// Write `out` from `base` with `mods` layered on top. Later mods win; the base jar's
/// `META-INF` is not copied.
pub fn merge_jar_mods(base: &Path, mods: &[PathBuf], out: &Path) -> LauncherResult<()> {
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
    }
    let staged = out.with_extension(format!("jar.{}.tmp", std::process::id()));
    let file = File::create(&staged).map_err(|e| LauncherError::io(&staged, e))?;
    let mut added = HashSet::new();
    if let Err(e) = write_merged(file, base, mods, &mut added) {
        let _ = std::fs::remove_file(&staged);
        return Err(e);
    }

    std::fs::rename(&staged, out).map_err(|e| LauncherError::io(out, e))?;
    debug!("Merged {} jar mods into {:?} ({} entries)", mods.len(), out, added.len());
    Ok(())
}

fn write_merged(file: File, base: &Path, mods: &[PathBuf], added: &mut HashSet<String>) -> LauncherResult<()> {
    let mut writer = ZipWriter::new(file);
    for jar_mod in mods.iter().rev() {
        copy_entries(&mut writer, jar_mod, added, false)?;
    }
    copy_entries(&mut writer, base, added, true)?;
    writer.finish()?;
    Ok(())
}

fn copy_entries(
    writer: &mut ZipWriter<File>,
    source: &Path,
    added: &mut HashSet<String>,
    skip_meta_inf: bool,
) -> LauncherResult<()> {
    let file = File::open(source).map_err(|e| LauncherError::io(source, e))?;
    let mut archive = ZipArchive::new(file)?;
    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i)?;
        let name = entry.name().to_string();
        if skip_meta_inf && name.starts_with("META-INF") {
            continue;
        }
        if !added.insert(name) {
            continue;
        }
        writer.raw_copy_file(entry)?;
    }
    Ok(())
}

#[async_trait]
impl LaunchStep for ModMinecraftJar {
    fn name(&self) -> &str {
        "ModMinecraftJar"
    }

    async fn execute(&mut self, ctx: &StepContext) -> StepOutcome {
        if let Err(e) = self.remove_final_jar() {
            return StepOutcome::failed(format!("Couldn't remove stale jar file: {}", e));
        }

        let (base, mods) = match self.inputs() {
            Ok(Some(inputs)) => inputs,
            Ok(None) => return StepOutcome::Succeeded,
            Err(e) => {
                ctx.log(e.to_string(), MessageLevel::Fatal);
                return StepOutcome::failed(format!("Couldn't create the modified jar: {}", e));
            }
        };

        ctx.log(format!("Applying {} jar mods...", mods.len()), MessageLevel::Launcher);
        let out = self.final_jar();
        let merged = tokio::task::spawn_blocking(move || merge_jar_mods(&base, &mods, &out)).await;
        match merged {
            Ok(Ok(())) => {
                info!("Created modded minecraft.jar for {}", self.instance.id());
                StepOutcome::Succeeded
            }
            Ok(Err(e)) => StepOutcome::failed(format!("Couldn't create the modified jar: {}", e)),
            Err(e) => StepOutcome::failed(format!("Couldn't create the modified jar: {}", e)),
        }
    }

    async fn finalize(&mut self, _ctx: &StepContext) {
        let _ = self.remove_final_jar();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use zip::write::SimpleFileOptions;

    fn write_jar(path: &Path, entries: &[(&str, &str)]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    fn read_entry(path: &Path, name: &str) -> Option<String> {
        let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut entry = archive.by_name(name).ok()?;
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        Some(content)
    }

    #[test]
    fn later_mods_win_and_base_signature_is_dropped() {
        let dir = std::env::temp_dir().join(format!("pl_jarmods_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let base = dir.join("client.jar");
        write_jar(
            &base,
            &[("a.class", "base"), ("b.class", "base"), ("META-INF/MOJANG.SF", "sig")],
        );
        let first = dir.join("first.zip");
        write_jar(&first, &[("a.class", "first"), ("b.class", "first")]);
        let second = dir.join("second.zip");
        write_jar(&second, &[("a.class", "second"), ("c.class", "second")]);

        let out = dir.join("bin").join("minecraft.jar");
        merge_jar_mods(&base, &[first, second], &out).unwrap();

        assert_eq!(read_entry(&out, "a.class").as_deref(), Some("second"));
        assert_eq!(read_entry(&out, "b.class").as_deref(), Some("first"));
        assert_eq!(read_entry(&out, "c.class").as_deref(), Some("second"));
        assert_eq!(read_entry(&out, "META-INF/MOJANG.SF"), None);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_mod_leaves_no_partial_jar() {
        let dir = std::env::temp_dir().join(format!("pl_jarmods_missing_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let base = dir.join("client.jar");
        write_jar(&base, &[("a.class", "base")]);
        let out = dir.join("minecraft.jar");
        assert!(merge_jar_mods(&base, &[dir.join("absent.zip")], &out).is_err());
        assert!(!out.exists());
        let leftovers = std::fs::read_dir(&dir).unwrap().count();
        assert_eq!(leftovers, 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
