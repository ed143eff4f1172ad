// ─── Launcher Patch Format ───
// Reads launcher-side version patches (`formatVersion: 1`): Mojang fields plus additive
// `+traits`, `+tweakers`, `+jvmArgs`, `+agents`, jar mods and the requirement graph.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::error;

use super::mojang_format::{
    as_object, read_library, read_string, read_version_properties, require_array, require_integer,
    string_list,
};
use super::problems::ProblemSeverity;
use super::require::{requires_from_json, Require};
use super::version_file::{VersionFile, MINECRAFT_UID};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::library::{Agent, Library, MojangLibraryDownloadInfo, HINT_LOCAL};
use crate::core::maven::CoordinateSpecifier;
use crate::core::pattern::cached_regex;

const UID_PATTERN: &str = r"^[a-zA-Z0-9_\-]+(?:\.[a-zA-Z0-9_\-]+)*$";
static UID_REGEX: OnceLock<Regex> = OnceLock::new();

/// Keys that used to mean something and now make the file unusable.
const REMOVED_KEYS: [&str; 5] = [
    "tweakers",
    "-libraries",
    "-tweakers",
    "-minecraftArguments",
    "+minecraftArguments",
];

/// Mojang library fields plus the launcher's `MMC-*` extensions.
fn library_from_json(out: &mut VersionFile, value: &Value, file: &str) -> LauncherResult<Option<Library>> {
    let Some(mut lib) = read_library(out, value, file)? else {
        return Ok(None);
    };
    let obj = as_object(value, file)?;
    if let Some(hint) = read_string(obj, "MMC-hint") {
        lib.hint = hint;
    }
    // Both spellings have shipped.
    if let Some(url) = read_string(obj, "MMC-absulute_url") {
        lib.absolute_url = url;
    }
    if let Some(url) = read_string(obj, "MMC-absoluteUrl") {
        lib.absolute_url = url;
    }
    if let Some(filename) = read_string(obj, "MMC-filename") {
        lib.filename = filename;
    }
    if let Some(display_name) = read_string(obj, "MMC-displayname") {
        lib.display_name = display_name;
    }
    Ok(Some(lib))
}

/// Deprecated `+jarMods` entry: a local file in the instance's jar mod folder.
fn plus_jar_mod_from_json(obj: &Map<String, Value>, file: &str, patch_name: &str) -> LauncherResult<Library> {
    let name = read_string(obj, "name")
        .ok_or_else(|| LauncherError::validation(file, "contains a jarmod that doesn't have a 'name' field"))?;

    let id = uuid::Uuid::new_v4();
    let mut lib = Library::new(CoordinateSpecifier::parse(&format!("org.multimc.jarmods:{}:1", id))?);
    lib.filename = name;
    lib.hint = HINT_LOCAL.to_string();
    lib.display_name = match read_string(obj, "originalName") {
        Some(original) if !original.is_empty() => original,
        _ => patch_name.replace(" (jar mod)", ""),
    };
    Ok(lib)
}

fn read_libraries(
    out: &mut VersionFile,
    obj: &Map<String, Value>,
    key: &str,
    file: &str,
) -> LauncherResult<Vec<Library>> {
    let mut libs = Vec::new();
    for value in require_array(obj, key, file)? {
        if let Some(lib) = library_from_json(out, value, file)? {
            libs.push(lib);
        }
    }
    Ok(libs)
}

/// Parse a launcher patch. `require_order` is set for user patches, which must carry `order`.
pub fn version_file_from_json(doc: &Value, file: &str, require_order: bool) -> LauncherResult<VersionFile> {
    let obj = as_object(doc, file)?;

    if obj.contains_key("formatVersion") {
        let format_version = require_integer(obj, "formatVersion", file)?;
        if format_version != 1 {
            return Err(LauncherError::validation(
                file,
                format!("unsupported format (formatVersion is {})", format_version),
            ));
        }
    }

    let mut out = VersionFile::default();
    if obj.contains_key("order") {
        out.order = require_integer(obj, "order", file)? as i32;
    } else if require_order {
        return Err(LauncherError::validation(file, "'order' is required"));
    }

    out.name = read_string(obj, "name").unwrap_or_default();
    out.uid = read_string(obj, "uid")
        .or_else(|| read_string(obj, "fileId"))
        .unwrap_or_default();
    if !cached_regex(&UID_REGEX, UID_PATTERN)?.is_match(&out.uid) {
        error!("{}: component uid {:?} contains illegal characters", file, out.uid);
        out.add_problem(
            ProblemSeverity::Error,
            "The component's 'uid' contains illegal characters! This can cause security issues.",
        );
    }
    out.version = read_string(obj, "version").unwrap_or_default();

    read_version_properties(obj, &mut out, file)?;

    if let Some(applet_class) = read_string(obj, "appletClass") {
        out.applet_class = applet_class;
    }
    if obj.contains_key("+tweakers") {
        out.tweakers = string_list(obj, "+tweakers", file)?;
    }
    if obj.contains_key("+traits") {
        out.traits.extend(string_list(obj, "+traits", file)?);
    }
    if obj.contains_key("+jvmArgs") {
        out.add_jvm_arguments = string_list(obj, "+jvmArgs", file)?;
    }

    if obj.contains_key("jarMods") {
        out.jar_mods = read_libraries(&mut out, obj, "jarMods", file)?;
    } else if obj.contains_key("+jarMods") {
        let patch_name = out.name.clone();
        for value in require_array(obj, "+jarMods", file)? {
            out.jar_mods
                .push(plus_jar_mod_from_json(as_object(value, file)?, file, &patch_name)?);
        }
    }

    if obj.contains_key("mods") {
        out.mods = read_libraries(&mut out, obj, "mods", file)?;
    }

    let has_libs = obj.contains_key("libraries");
    let has_plus_libs = obj.contains_key("+libraries");
    if has_libs && has_plus_libs {
        out.add_problem(
            ProblemSeverity::Warning,
            "Version file has both '+libraries' and 'libraries'. This is no longer supported.",
        );
    }
    if has_libs {
        let libs = read_libraries(&mut out, obj, "libraries", file)?;
        out.libraries.extend(libs);
    }
    if has_plus_libs {
        let libs = read_libraries(&mut out, obj, "+libraries", file)?;
        out.libraries.extend(libs);
    }

    if obj.contains_key("mavenFiles") {
        out.maven_files = read_libraries(&mut out, obj, "mavenFiles", file)?;
    }

    if obj.contains_key("+agents") {
        for value in require_array(obj, "+agents", file)? {
            if let Some(library) = library_from_json(&mut out, value, file)? {
                let argument = read_string(as_object(value, file)?, "argument").unwrap_or_default();
                out.agents.push(Agent::new(library, argument));
            }
        }
    }

    if let Some(main_jar) = obj.get("mainJar") {
        as_object(main_jar, file)?;
        out.main_jar = library_from_json(&mut out, main_jar, file)?;
    } else if !out.minecraft_version.is_empty() {
        let spec = CoordinateSpecifier::parse(&format!("com.mojang:minecraft:{}:client", out.minecraft_version))?;
        let mut lib = Library::new(spec);
        match out.mojang_downloads.get("client") {
            Some(client) => {
                lib.mojang_downloads = Some(MojangLibraryDownloadInfo {
                    artifact: Some(client.clone()),
                    classifiers: Default::default(),
                })
            }
            None => out.add_problem(
                ProblemSeverity::Error,
                "URL for the main jar could not be determined - the version has no client download.",
            ),
        }
        out.main_jar = Some(lib);
    }

    if let Some(requires) = obj.get("requires") {
        out.requires = requires_from_json(requires, file)?;
    }
    out.depends_on_minecraft_version = read_string(obj, "mcVersion").unwrap_or_default();
    if !out.depends_on_minecraft_version.is_empty() {
        let mc = Require::exact(MINECRAFT_UID, &out.depends_on_minecraft_version);
        out.requires.insert(mc);
    }
    if let Some(conflicts) = obj.get("conflicts") {
        out.conflicts = requires_from_json(conflicts, file)?;
    }
    if let Some(volatile) = obj.get("volatile") {
        out.is_volatile = volatile
            .as_bool()
            .ok_or_else(|| LauncherError::validation(file, "'volatile' must be a boolean"))?;
    }

    for key in REMOVED_KEYS {
        if obj.contains_key(key) {
            out.add_problem(
                ProblemSeverity::Error,
                format!("Version file contains unsupported element '{}'", key),
            );
        }
    }

    Ok(out)
}
