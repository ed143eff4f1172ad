// ─── Mojang Version Format ───
// Reads Mojang's version JSON (and the Mojang-shaped subset of launcher patches).

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use super::problems::ProblemSeverity;
use super::version_file::{MojangAssetIndexInfo, VersionFile, MINECRAFT_UID};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::library::{downloads_from_json, Library, MojangDownloadInfo};

/// Highest `minimumLauncherVersion` we know how to launch.
pub const CURRENT_MINIMUM_LAUNCHER_VERSION: i64 = 18;

// ── JSON helpers ────────────────────────────────────────

pub(super) fn as_object<'a>(value: &'a Value, file: &str) -> LauncherResult<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| LauncherError::validation(file, "is not an object"))
}

pub(super) fn read_string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

pub(super) fn require_string(obj: &Map<String, Value>, key: &str, file: &str) -> LauncherResult<String> {
    read_string(obj, key)
        .ok_or_else(|| LauncherError::validation(file, format!("'{}' must be a string", key)))
}

pub(super) fn require_integer(obj: &Map<String, Value>, key: &str, file: &str) -> LauncherResult<i64> {
    obj.get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| LauncherError::validation(file, format!("'{}' must be an integer", key)))
}

pub(super) fn require_array<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    file: &str,
) -> LauncherResult<&'a Vec<Value>> {
    obj.get(key)
        .and_then(|v| v.as_array())
        .ok_or_else(|| LauncherError::validation(file, format!("'{}' must be an array", key)))
}

pub(super) fn string_list(obj: &Map<String, Value>, key: &str, file: &str) -> LauncherResult<Vec<String>> {
    require_array(obj, key, file)?
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| LauncherError::validation(file, format!("'{}' must only contain strings", key)))
        })
        .collect()
}

fn time_from_s3(raw: Option<String>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    match DateTime::parse_from_rfc3339(&raw) {
        Ok(t) => Some(t.with_timezone(&Utc)),
        Err(e) => {
            warn!("Unparseable timestamp {:?}: {}", raw, e);
            None
        }
    }
}

fn asset_index_from_json(value: &Value, file: &str) -> LauncherResult<MojangAssetIndexInfo> {
    let obj = as_object(value, file)?;
    let info = MojangDownloadInfo::from_json(value, file)?;
    Ok(MojangAssetIndexInfo {
        id: require_string(obj, "id", file)?,
        total_size: require_integer(obj, "totalSize", file)?.max(0) as u64,
        sha1: info.sha1,
        size: info.size,
        url: info.url,
        known: true,
    })
}

/// Library whose coordinate does not parse becomes an Error problem and is dropped;
/// every other parse failure aborts the file.
pub(super) fn read_library(out: &mut VersionFile, value: &Value, file: &str) -> LauncherResult<Option<Library>> {
    match Library::from_json(value, file) {
        Ok(lib) => Ok(Some(lib)),
        Err(LauncherError::InvalidSpecifier(raw)) => {
            warn!("{}: skipping library with invalid name {:?}", file, raw);
            out.add_problem(
                ProblemSeverity::Error,
                format!("Library name '{}' is not a valid coordinate", raw),
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Fields shared by Mojang files and launcher patches.
pub(super) fn read_version_properties(
    obj: &Map<String, Value>,
    out: &mut VersionFile,
    file: &str,
) -> LauncherResult<()> {
    if let Some(id) = read_string(obj, "id") {
        out.minecraft_version = id;
    }
    if let Some(main_class) = read_string(obj, "mainClass") {
        out.main_class = main_class;
    }
    if let Some(args) = read_string(obj, "minecraftArguments") {
        out.minecraft_arguments = args;
    }
    if out.minecraft_arguments.is_empty() {
        let process_arguments = read_string(obj, "processArguments").unwrap_or_default();
        match process_arguments.to_lowercase().as_str() {
            "" => {}
            "legacy" => out.minecraft_arguments = " ${auth_player_name} ${auth_session}".to_string(),
            "username_session" => {
                out.minecraft_arguments = "--username ${auth_player_name} --session ${auth_session}".to_string()
            }
            "username_session_version" => {
                out.minecraft_arguments =
                    "--username ${auth_player_name} --session ${auth_session} --version ${profile_name}"
                        .to_string()
            }
            _ => out.add_problem(
                ProblemSeverity::Error,
                format!("processArguments is set to unknown value '{}'", process_arguments),
            ),
        }
    }
    if let Some(version_type) = read_string(obj, "type") {
        out.version_type = version_type;
    }
    if let Some(assets) = read_string(obj, "assets") {
        out.assets = assets;
    }
    if let Some(index) = obj.get("assetIndex") {
        out.mojang_asset_index = Some(asset_index_from_json(index, file)?);
    } else if !out.assets.is_empty() {
        out.mojang_asset_index = Some(MojangAssetIndexInfo::from_id(&out.assets));
    }

    out.release_time = time_from_s3(read_string(obj, "releaseTime"));
    out.updated_time = time_from_s3(read_string(obj, "time"));

    if obj.contains_key("minimumLauncherVersion") {
        out.minimum_launcher_version = require_integer(obj, "minimumLauncherVersion", file)?;
        if out.minimum_launcher_version > CURRENT_MINIMUM_LAUNCHER_VERSION {
            let message = format!(
                "The 'minimumLauncherVersion' value of this version ({}) is higher than supported ({}). It might not work properly!",
                out.minimum_launcher_version, CURRENT_MINIMUM_LAUNCHER_VERSION
            );
            out.add_problem(ProblemSeverity::Warning, message);
        }
    }

    if obj.contains_key("compatibleJavaMajors") {
        for major in require_array(obj, "compatibleJavaMajors", file)? {
            let major = major
                .as_u64()
                .ok_or_else(|| LauncherError::validation(file, "'compatibleJavaMajors' must only contain integers"))?;
            out.compatible_java_majors.push(major as u32);
        }
    }
    if let Some(name) = read_string(obj, "compatibleJavaName") {
        out.compatible_java_name = name;
    }

    if let Some(downloads) = obj.get("downloads") {
        out.mojang_downloads = downloads_from_json(downloads, file)?;
    }
    Ok(())
}

/// Parse a Mojang version JSON into a `net.minecraft` patch.
pub fn version_file_from_json(doc: &Value, file: &str) -> LauncherResult<VersionFile> {
    let obj = as_object(doc, file)?;
    let mut out = VersionFile::default();

    read_version_properties(obj, &mut out, file)?;
    out.name = "Minecraft".to_string();
    out.uid = MINECRAFT_UID.to_string();
    out.version = out.minecraft_version.clone();

    if obj.contains_key("libraries") {
        for value in require_array(obj, "libraries", file)? {
            if let Some(lib) = read_library(&mut out, value, file)? {
                out.libraries.push(lib);
            }
        }
    }
    Ok(out)
}
