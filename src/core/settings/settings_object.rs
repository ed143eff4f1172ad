// ─── Settings Object ───
// Typed key-value settings with registered defaults, synonyms, gated overrides and JSON
// persistence of the values that differ from their defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::error::{LauncherError, LauncherResult};

const APP_DIR_NAME: &str = "profile-launch";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    String(String),
    StringList(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Bool,
    Int,
    String,
    StringList,
}

impl SettingValue {
    pub fn kind(&self) -> SettingKind {
        match self {
            SettingValue::Bool(_) => SettingKind::Bool,
            SettingValue::Int(_) => SettingKind::Int,
            SettingValue::String(_) => SettingKind::String,
            SettingValue::StringList(_) => SettingKind::StringList,
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Int(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::String(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::String(value)
    }
}

impl From<Vec<String>> for SettingValue {
    fn from(value: Vec<String>) -> Self {
        SettingValue::StringList(value)
    }
}

struct Override {
    global: Arc<SettingsObject>,
    gate: String,
    /// Writes also go to `global` while the gate is off.
    passthrough: bool,
}

struct Setting {
    default: SettingValue,
    override_of: Option<Override>,
}

#[derive(Default)]
struct Inner {
    settings: BTreeMap<String, Setting>,
    /// Synonym -> primary id.
    aliases: BTreeMap<String, String>,
    /// Explicitly set values, keyed by primary id.
    values: BTreeMap<String, SettingValue>,
}

/// A settings store shared between an instance and its launch steps.
pub struct SettingsObject {
    path: Option<PathBuf>,
    inner: RwLock<Inner>,
}

impl SettingsObject {
    /// In-memory store, never persisted.
    pub fn new() -> Self {
        Self {
            path: None,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Store backed by a JSON file. A missing file starts empty.
    pub fn load(path: impl Into<PathBuf>) -> LauncherResult<Self> {
        let path = path.into();
        let mut inner = Inner::default();
        if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|e| LauncherError::io(&path, e))?;
            inner.values = serde_json::from_str(&raw)
                .map_err(|e| LauncherError::Settings(format!("{}: {}", path.display(), e)))?;
            debug!("Loaded {} settings from {:?}", inner.values.len(), path);
        }
        Ok(Self {
            path: Some(path),
            inner: RwLock::new(inner),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // ── Registration ────────────────────────────────────

    pub fn register_setting(&self, id: &str, default: impl Into<SettingValue>) {
        self.register_setting_with_synonyms(&[id], default);
    }

    /// The first id is the primary one; values stored under any synonym are migrated to it.
    pub fn register_setting_with_synonyms(&self, ids: &[&str], default: impl Into<SettingValue>) {
        let Some((primary, synonyms)) = ids.split_first() else {
            return;
        };
        let default = default.into();
        let mut inner = self.write();
        if inner.settings.contains_key(*primary) {
            warn!("Setting {} registered twice", primary);
            return;
        }
        for synonym in synonyms {
            inner.aliases.insert(synonym.to_string(), primary.to_string());
            if let Some(value) = inner.values.remove(*synonym) {
                inner.values.entry(primary.to_string()).or_insert(value);
            }
        }
        discard_mistyped(&mut inner.values, primary, &default);
        inner.settings.insert(
            primary.to_string(),
            Setting {
                default,
                override_of: None,
            },
        );
    }

    /// Register `id` so it reads the local value while `gate` is true and `global`'s
    /// value otherwise.
    pub fn register_override(&self, id: &str, global: Arc<SettingsObject>, gate: &str) -> LauncherResult<()> {
        self.register_gated(id, global, gate, false)
    }

    /// Like [`register_override`](Self::register_override), but writes made while the gate
    /// is off land in `global`.
    pub fn register_passthrough(&self, id: &str, global: Arc<SettingsObject>, gate: &str) -> LauncherResult<()> {
        self.register_gated(id, global, gate, true)
    }

    fn register_gated(&self, id: &str, global: Arc<SettingsObject>, gate: &str, passthrough: bool) -> LauncherResult<()> {
        let default = global.get(id)?;
        let mut inner = self.write();
        discard_mistyped(&mut inner.values, id, &default);
        inner.settings.insert(
            id.to_string(),
            Setting {
                default,
                override_of: Some(Override {
                    global,
                    gate: gate.to_string(),
                    passthrough,
                }),
            },
        );
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        let inner = self.read();
        inner.settings.contains_key(id) || inner.aliases.contains_key(id)
    }

    // ── Access ──────────────────────────────────────────

    pub fn get(&self, id: &str) -> LauncherResult<SettingValue> {
        let (local, gated) = {
            let inner = self.read();
            let primary = resolve_id(&inner, id)?;
            let setting = &inner.settings[&primary];
            let local = inner
                .values
                .get(&primary)
                .cloned()
                .unwrap_or_else(|| setting.default.clone());
            let gated = setting
                .override_of
                .as_ref()
                .map(|o| (o.global.clone(), o.gate.clone(), primary.clone()));
            (local, gated)
        };

        match gated {
            Some((global, gate, primary)) => {
                if self.get_bool(&gate)? {
                    Ok(local)
                } else {
                    global.get(&primary)
                }
            }
            None => Ok(local),
        }
    }

    /// Type-checked write, persisted right away for file-backed stores.
    pub fn set(&self, id: &str, value: impl Into<SettingValue>) -> LauncherResult<()> {
        let value = value.into();
        if let Some((global, primary)) = self.passthrough_target(id)? {
            return global.set(&primary, value);
        }
        {
            let mut inner = self.write();
            let primary = resolve_id(&inner, id)?;
            let default = &inner.settings[&primary].default;
            if default.kind() != value.kind() {
                return Err(LauncherError::Settings(format!(
                    "Setting {} expects {:?}, got {:?}",
                    primary,
                    default.kind(),
                    value.kind()
                )));
            }
            if *default == value && inner.settings[&primary].override_of.is_none() {
                inner.values.remove(&primary);
            } else {
                inner.values.insert(primary, value);
            }
        }
        self.save_if_backed()
    }

    pub fn reset(&self, id: &str) -> LauncherResult<()> {
        if let Some((global, primary)) = self.passthrough_target(id)? {
            return global.reset(&primary);
        }
        {
            let mut inner = self.write();
            let primary = resolve_id(&inner, id)?;
            inner.values.remove(&primary);
        }
        self.save_if_backed()
    }

    /// The global object a write to `id` should go to, if any.
    fn passthrough_target(&self, id: &str) -> LauncherResult<Option<(Arc<SettingsObject>, String)>> {
        let gated = {
            let inner = self.read();
            let primary = resolve_id(&inner, id)?;
            inner.settings[&primary]
                .override_of
                .as_ref()
                .filter(|o| o.passthrough)
                .map(|o| (o.global.clone(), o.gate.clone(), primary.clone()))
        };
        match gated {
            Some((global, gate, primary)) if !self.get_bool(&gate)? => Ok(Some((global, primary))),
            _ => Ok(None),
        }
    }

    pub fn get_bool(&self, id: &str) -> LauncherResult<bool> {
        match self.get(id)? {
            SettingValue::Bool(value) => Ok(value),
            other => Err(type_error(id, SettingKind::Bool, &other)),
        }
    }

    pub fn get_int(&self, id: &str) -> LauncherResult<i64> {
        match self.get(id)? {
            SettingValue::Int(value) => Ok(value),
            other => Err(type_error(id, SettingKind::Int, &other)),
        }
    }

    pub fn get_string(&self, id: &str) -> LauncherResult<String> {
        match self.get(id)? {
            SettingValue::String(value) => Ok(value),
            other => Err(type_error(id, SettingKind::String, &other)),
        }
    }

    pub fn get_string_list(&self, id: &str) -> LauncherResult<Vec<String>> {
        match self.get(id)? {
            SettingValue::StringList(value) => Ok(value),
            other => Err(type_error(id, SettingKind::StringList, &other)),
        }
    }

    // ── Persistence ─────────────────────────────────────

    pub fn save(&self) -> LauncherResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(&self.read().values)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| LauncherError::io(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| LauncherError::io(path, e))
    }

    fn save_if_backed(&self) -> LauncherResult<()> {
        if self.path.is_some() {
            self.save()
        } else {
            Ok(())
        }
    }
}

impl Default for SettingsObject {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SettingsObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.read();
        f.debug_struct("SettingsObject")
            .field("path", &self.path)
            .field("settings", &inner.settings.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn resolve_id(inner: &Inner, id: &str) -> LauncherResult<String> {
    if inner.settings.contains_key(id) {
        return Ok(id.to_string());
    }
    inner
        .aliases
        .get(id)
        .cloned()
        .ok_or_else(|| LauncherError::Settings(format!("Unknown setting {}", id)))
}

fn discard_mistyped(values: &mut BTreeMap<String, SettingValue>, id: &str, default: &SettingValue) {
    let mistyped = values.get(id).is_some_and(|v| v.kind() != default.kind());
    if mistyped {
        warn!("Stored value of {} has the wrong type, using the default", id);
        values.remove(id);
    }
}

fn type_error(id: &str, expected: SettingKind, got: &SettingValue) -> LauncherError {
    LauncherError::Settings(format!("Setting {} is {:?}, not {:?}", id, got.kind(), expected))
}

/// Root directory for shared libraries, assets and instances.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_default_until_set() {
        let settings = SettingsObject::new();
        settings.register_setting("MaxMemAlloc", 1024_i64);
        assert_eq!(settings.get_int("MaxMemAlloc").unwrap(), 1024);
        settings.set("MaxMemAlloc", 4096_i64).unwrap();
        assert_eq!(settings.get_int("MaxMemAlloc").unwrap(), 4096);
        settings.reset("MaxMemAlloc").unwrap();
        assert_eq!(settings.get_int("MaxMemAlloc").unwrap(), 1024);
    }

    #[test]
    fn set_rejects_wrong_type_and_unknown_ids() {
        let settings = SettingsObject::new();
        settings.register_setting("JavaPath", "java");
        assert!(matches!(settings.set("JavaPath", true), Err(LauncherError::Settings(_))));
        assert!(settings.get("Nope").is_err());
    }

    #[test]
    fn synonyms_resolve_to_primary() {
        let settings = SettingsObject::new();
        settings.register_setting_with_synonyms(&["PreLaunchCommand", "PreLaunchCmd"], "");
        settings.set("PreLaunchCmd", "echo hi").unwrap();
        assert_eq!(settings.get_string("PreLaunchCommand").unwrap(), "echo hi");
    }

    #[test]
    fn override_follows_gate() {
        let global = Arc::new(SettingsObject::new());
        global.register_setting("JvmArgs", "-Dglobal");

        let local = SettingsObject::new();
        local.register_setting("OverrideJava", false);
        local.register_override("JvmArgs", global.clone(), "OverrideJava").unwrap();
        local.set("JvmArgs", "-Dlocal").unwrap();

        assert_eq!(local.get_string("JvmArgs").unwrap(), "-Dglobal");
        local.set("OverrideJava", true).unwrap();
        assert_eq!(local.get_string("JvmArgs").unwrap(), "-Dlocal");
    }

    #[test]
    fn passthrough_writes_global_while_gate_is_off() {
        let global = Arc::new(SettingsObject::new());
        global.register_setting("JavaVersion", "");

        let local = SettingsObject::new();
        local.register_setting("OverrideJava", false);
        local.register_passthrough("JavaVersion", global.clone(), "OverrideJava").unwrap();

        local.set("JavaVersion", "17.0.2").unwrap();
        assert_eq!(global.get_string("JavaVersion").unwrap(), "17.0.2");

        local.set("OverrideJava", true).unwrap();
        local.set("JavaVersion", "1.8.0_51").unwrap();
        assert_eq!(local.get_string("JavaVersion").unwrap(), "1.8.0_51");
        assert_eq!(global.get_string("JavaVersion").unwrap(), "17.0.2");
    }

    #[test]
    fn only_changed_values_are_persisted() {
        let dir = std::env::temp_dir().join(format!("pl_settings_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("instance.json");

        let settings = SettingsObject::load(&path).unwrap();
        settings.register_setting("MinMemAlloc", 512_i64);
        settings.register_setting("WrapperCommand", "");
        settings.set("WrapperCommand", "gamemoderun").unwrap();

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({"WrapperCommand": "gamemoderun"}));

        let reloaded = SettingsObject::load(&path).unwrap();
        reloaded.register_setting("WrapperCommand", "");
        assert_eq!(reloaded.get_string("WrapperCommand").unwrap(), "gamemoderun");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
