// ─── Component List ───
// The instance's ordered components (`mmc-pack.json`), the patch file behind each one, and
// the cached launch profile built from them.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::launch_profile::LaunchProfile;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::rules::RuntimeContext;
use crate::core::version::{
    mojang_format, onesix_format, ProblemSeverity, VersionFile, MINECRAFT_UID,
};

const PACK_FILE: &str = "mmc-pack.json";
const PACK_FORMAT_VERSION: i64 = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub uid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dependency_only: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub important: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cached_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cached_version: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cached_volatile: bool,
}

impl Component {
    pub fn new(uid: &str, version: &str) -> Self {
        Self {
            uid: uid.to_string(),
            version: version.to_string(),
            ..Default::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.disabled
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackFile {
    format_version: i64,
    #[serde(default)]
    components: Vec<Component>,
}

pub struct ComponentList {
    instance_root: PathBuf,
    meta_root: PathBuf,
    components: Vec<Component>,
    profile: RwLock<Option<Arc<LaunchProfile>>>,
}

impl ComponentList {
    pub fn new(instance_root: impl Into<PathBuf>, meta_root: impl Into<PathBuf>) -> Self {
        Self {
            instance_root: instance_root.into(),
            meta_root: meta_root.into(),
            components: Vec::new(),
            profile: RwLock::new(None),
        }
    }

    /// Load `mmc-pack.json` from the instance root. A missing file is an empty list.
    pub fn load(instance_root: impl Into<PathBuf>, meta_root: impl Into<PathBuf>) -> LauncherResult<Self> {
        let mut list = Self::new(instance_root, meta_root);
        let path = list.pack_path();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No {} in {:?}", PACK_FILE, list.instance_root);
                return Ok(list);
            }
            Err(e) => return Err(LauncherError::io(&path, e)),
        };

        let pack: PackFile = serde_json::from_str(&content)
            .map_err(|e| LauncherError::validation(PACK_FILE, e.to_string()))?;
        if pack.format_version != PACK_FORMAT_VERSION {
            return Err(LauncherError::validation(
                PACK_FILE,
                format!("unsupported formatVersion {}", pack.format_version),
            ));
        }
        list.components = pack.components;
        info!("Loaded {} components from {:?}", list.components.len(), path);
        Ok(list)
    }

    pub fn save(&self) -> LauncherResult<()> {
        let pack = PackFile {
            format_version: PACK_FORMAT_VERSION,
            components: self.components.clone(),
        };
        std::fs::create_dir_all(&self.instance_root)
            .map_err(|e| LauncherError::io(&self.instance_root, e))?;
        let path = self.pack_path();
        let staged = path.with_extension("json.tmp");
        std::fs::write(&staged, serde_json::to_vec_pretty(&pack)?)
            .map_err(|e| LauncherError::io(&staged, e))?;
        std::fs::rename(&staged, &path).map_err(|e| LauncherError::io(&path, e))?;
        Ok(())
    }

    fn pack_path(&self) -> PathBuf {
        self.instance_root.join(PACK_FILE)
    }

    // ── Components ──────────────────────────────────────

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn get_component(&self, uid: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.uid == uid)
    }

    pub fn get_component_version(&self, uid: &str) -> Option<&str> {
        self.get_component(uid).map(|c| c.version.as_str())
    }

    /// Add a component, or retarget the version of an existing one.
    pub fn set_component_version(&mut self, uid: &str, version: &str) {
        match self.components.iter_mut().find(|c| c.uid == uid) {
            Some(component) => component.version = version.to_string(),
            None => self.components.push(Component::new(uid, version)),
        }
        self.invalidate_launch_profile();
    }

    pub fn set_component_enabled(&mut self, uid: &str, enabled: bool) -> bool {
        let Some(component) = self.components.iter_mut().find(|c| c.uid == uid) else {
            return false;
        };
        component.disabled = !enabled;
        self.invalidate_launch_profile();
        true
    }

    pub fn remove_component(&mut self, uid: &str) -> bool {
        let before = self.components.len();
        self.components.retain(|c| c.uid != uid);
        let removed = self.components.len() != before;
        if removed {
            self.invalidate_launch_profile();
        }
        removed
    }

    // ── Patch files ─────────────────────────────────────

    /// `patches/<uid>.json` in the instance overrides the cached `meta/<uid>/<version>.json`.
    pub fn patch_file_path(&self, component: &Component) -> PathBuf {
        let custom = self
            .instance_root
            .join("patches")
            .join(format!("{}.json", component.uid));
        if custom.exists() {
            return custom;
        }
        self.meta_root
            .join(&component.uid)
            .join(format!("{}.json", component.version))
    }

    pub fn load_version_file(&self, component: &Component) -> LauncherResult<VersionFile> {
        let path = self.patch_file_path(component);
        load_patch(&path, &component.uid)
    }

    // ── Profile ─────────────────────────────────────────

    /// Drop the cached profile; the next [`get_profile`](Self::get_profile) rebuilds it.
    pub fn invalidate_launch_profile(&self) {
        let mut slot = match self.profile.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = None;
    }

    /// The resolved profile, built from scratch if nothing is cached.
    pub fn get_profile(&self, ctx: &RuntimeContext) -> LauncherResult<Arc<LaunchProfile>> {
        {
            let slot = match self.profile.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(profile) = slot.as_ref() {
                return Ok(Arc::clone(profile));
            }
        }

        let profile = Arc::new(self.build_profile(ctx)?);
        let mut slot = match self.profile.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(Arc::clone(&profile));
        Ok(profile)
    }

    fn build_profile(&self, ctx: &RuntimeContext) -> LauncherResult<LaunchProfile> {
        let mut enabled: Vec<(&Component, VersionFile)> = Vec::new();
        for component in self.components.iter().filter(|c| c.is_enabled()) {
            enabled.push((component, self.load_version_file(component)?));
        }

        let mut profile = LaunchProfile::from_patches(enabled.iter().map(|(_, file)| file), ctx);
        for (component, file) in &enabled {
            for problem in file.problems.problems() {
                profile.add_problem(
                    problem.severity,
                    format!("{}: {}", component.uid, problem.description),
                );
            }
        }
        self.check_requirements(&enabled, &mut profile);
        debug!(
            "Built launch profile for {:?} ({} libraries)",
            self.instance_root,
            profile.get_libraries().len()
        );
        Ok(profile)
    }

    fn check_requirements(&self, enabled: &[(&Component, VersionFile)], profile: &mut LaunchProfile) {
        let find = |uid: &str| enabled.iter().find(|(c, _)| c.uid == uid).map(|(c, _)| *c);

        for (component, file) in enabled {
            for req in &file.requires {
                match find(&req.uid) {
                    None => profile.add_problem(
                        ProblemSeverity::Error,
                        format!("{} requires {}, which is missing", component.uid, req.uid),
                    ),
                    Some(dep) if !req.equals.is_empty() && dep.version != req.equals => {
                        profile.add_problem(
                            ProblemSeverity::Error,
                            format!(
                                "{} requires {} {}, but {} is selected",
                                component.uid, req.uid, req.equals, dep.version
                            ),
                        )
                    }
                    Some(_) => {}
                }
            }
            for conflict in &file.conflicts {
                if find(&conflict.uid).is_some() {
                    profile.add_problem(
                        ProblemSeverity::Error,
                        format!("{} conflicts with {}", component.uid, conflict.uid),
                    );
                }
            }
        }
    }
}

/// Parse one patch file. Raw Mojang version files are accepted for `net.minecraft`.
pub fn load_patch(path: &Path, uid: &str) -> LauncherResult<VersionFile> {
    let file_name = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|e| LauncherError::io(path, e))?;
    let doc: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| LauncherError::validation(&file_name, e.to_string()))?;

    let is_mojang = uid == MINECRAFT_UID
        && doc.get("formatVersion").is_none()
        && doc.get("uid").is_none();
    if is_mojang {
        let mut file = mojang_format::version_file_from_json(&doc, &file_name)?;
        // Mojang files carry no order; Minecraft goes first.
        file.order = -2;
        return Ok(file);
    }

    let file = onesix_format::version_file_from_json(&doc, &file_name, false)?;
    if !file.uid.is_empty() && file.uid != uid {
        warn!("{} declares uid {} but is loaded as {}", file_name, file.uid, uid);
    }
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_instance(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pl_components_{}_{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_json(path: &Path, value: serde_json::Value) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();
    }

    fn seed(root: &Path) {
        write_json(
            &root.join("instance").join(PACK_FILE),
            serde_json::json!({
                "formatVersion": 1,
                "components": [
                    {"uid": "net.minecraftforge", "version": "14.23.5.2860"},
                    {"uid": "net.minecraft", "version": "1.12.2", "important": true},
                    {"uid": "com.example.disabled", "version": "1", "disabled": true}
                ]
            }),
        );
        write_json(
            &root.join("meta/net.minecraft/1.12.2.json"),
            serde_json::json!({
                "id": "1.12.2",
                "mainClass": "net.minecraft.client.main.Main",
                "libraries": [{"name": "org.ow2.asm:asm:5.0"}]
            }),
        );
        write_json(
            &root.join("meta/net.minecraftforge/14.23.5.2860.json"),
            serde_json::json!({
                "formatVersion": 1,
                "uid": "net.minecraftforge",
                "order": 5,
                "mainClass": "net.minecraft.launchwrapper.Launch",
                "requires": [{"uid": "net.minecraft", "equals": "1.12.2"}],
                "libraries": [{"name": "org.ow2.asm:asm:5.2"}]
            }),
        );
    }

    #[test]
    fn builds_profile_sorted_by_order_skipping_disabled() {
        let root = temp_instance("build");
        seed(&root);
        let list = ComponentList::load(root.join("instance"), root.join("meta")).unwrap();
        assert_eq!(list.components().len(), 3);
        assert_eq!(list.get_component_version("net.minecraft"), Some("1.12.2"));

        let ctx = RuntimeContext::new("linux", "64", "x86_64");
        let profile = list.get_profile(&ctx).unwrap();
        assert_eq!(profile.get_main_class(), "net.minecraft.launchwrapper.Launch");
        assert_eq!(profile.get_minecraft_version(), "1.12.2");
        assert_eq!(profile.get_libraries().len(), 1);
        assert_eq!(profile.get_libraries()[0].name.version(), "5.2");
        assert_eq!(profile.get_problem_severity(), ProblemSeverity::None);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn profile_is_cached_until_invalidated() {
        let root = temp_instance("cache");
        seed(&root);
        let mut list = ComponentList::load(root.join("instance"), root.join("meta")).unwrap();
        let ctx = RuntimeContext::new("linux", "64", "x86_64");

        let first = list.get_profile(&ctx).unwrap();
        let second = list.get_profile(&ctx).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        assert!(list.set_component_enabled("net.minecraftforge", false));
        let third = list.get_profile(&ctx).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.get_main_class(), "net.minecraft.client.main.Main");

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn unmet_requirement_is_an_error_problem() {
        let root = temp_instance("requires");
        seed(&root);
        let mut list = ComponentList::load(root.join("instance"), root.join("meta")).unwrap();
        assert!(list.remove_component("net.minecraft"));

        let ctx = RuntimeContext::new("linux", "64", "x86_64");
        let profile = list.get_profile(&ctx).unwrap();
        assert_eq!(profile.get_problem_severity(), ProblemSeverity::Error);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn instance_patch_overrides_metadata() {
        let root = temp_instance("override");
        seed(&root);
        write_json(
            &root.join("instance/patches/net.minecraft.json"),
            serde_json::json!({
                "formatVersion": 1,
                "uid": "net.minecraft",
                "order": -2,
                "id": "1.12.2",
                "mainClass": "custom.Main"
            }),
        );
        let mut list = ComponentList::load(root.join("instance"), root.join("meta")).unwrap();
        list.set_component_enabled("net.minecraftforge", false);

        let ctx = RuntimeContext::new("linux", "64", "x86_64");
        let profile = list.get_profile(&ctx).unwrap();
        assert_eq!(profile.get_main_class(), "custom.Main");

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn save_round_trips_pack_file() {
        let root = temp_instance("save");
        let mut list = ComponentList::new(root.join("instance"), root.join("meta"));
        list.set_component_version("net.minecraft", "1.7.10");
        list.save().unwrap();

        let loaded = ComponentList::load(root.join("instance"), root.join("meta")).unwrap();
        assert_eq!(loaded.components(), list.components());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn broken_patch_aborts_the_build() {
        let root = temp_instance("broken");
        seed(&root);
        std::fs::write(root.join("meta/net.minecraft/1.12.2.json"), b"{ not json").unwrap();
        let list = ComponentList::load(root.join("instance"), root.join("meta")).unwrap();
        let ctx = RuntimeContext::new("linux", "64", "x86_64");
        assert!(matches!(list.get_profile(&ctx), Err(LauncherError::Validation { .. })));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn equal_orders_keep_list_position() {
        let root = temp_instance("ties");
        seed(&root);
        for (uid, main_class) in [("com.example.alpha", "alpha.Main"), ("com.example.beta", "beta.Main")] {
            write_json(
                &root.join(format!("meta/{}/1.0.json", uid)),
                serde_json::json!({
                    "formatVersion": 1,
                    "uid": uid,
                    "order": 10,
                    "mainClass": main_class
                }),
            );
        }
        let write_pack = |first: &str, second: &str| {
            write_json(
                &root.join("instance").join(PACK_FILE),
                serde_json::json!({
                    "formatVersion": 1,
                    "components": [
                        {"uid": first, "version": "1.0"},
                        {"uid": "net.minecraft", "version": "1.12.2"},
                        {"uid": second, "version": "1.0"}
                    ]
                }),
            );
        };
        let ctx = RuntimeContext::new("linux", "64", "x86_64");

        write_pack("com.example.alpha", "com.example.beta");
        let list = ComponentList::load(root.join("instance"), root.join("meta")).unwrap();
        assert_eq!(list.get_profile(&ctx).unwrap().get_main_class(), "beta.Main");

        write_pack("com.example.beta", "com.example.alpha");
        let list = ComponentList::load(root.join("instance"), root.join("meta")).unwrap();
        assert_eq!(list.get_profile(&ctx).unwrap().get_main_class(), "alpha.Main");

        let _ = std::fs::remove_dir_all(&root);
    }
}
