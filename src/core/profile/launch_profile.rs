// ─── Launch Profile ───
// The fold accumulator: version patches applied in order produce one launch configuration.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::library::{Agent, ApplicableFiles, Library};
use crate::core::rules::RuntimeContext;
use crate::core::version::{
    MojangAssetIndexInfo, ProblemContainer, ProblemSeverity, RequireSet, Version, VersionFile,
};

#[derive(Debug, Clone, Default)]
pub struct LaunchProfile {
    minecraft_version: String,
    minecraft_version_type: String,
    minecraft_assets: Option<MojangAssetIndexInfo>,
    minecraft_arguments: String,
    add_jvm_arguments: Vec<String>,
    tweakers: Vec<String>,
    main_class: String,
    applet_class: String,
    libraries: Vec<Library>,
    native_libraries: Vec<Library>,
    maven_files: Vec<Library>,
    agents: Vec<Agent>,
    main_jar: Option<Library>,
    traits: BTreeSet<String>,
    jar_mods: Vec<Library>,
    mods: Vec<Library>,
    compatible_java_majors: Vec<u32>,
    requires: RequireSet,
    conflicts: RequireSet,
    problems: ProblemContainer,
}

/// Index of the single entry matching `needle` by group/artifact/classifier.
/// Ambiguous matches count as no match.
fn find_library_by_name(haystack: &[Library], needle: &Library) -> Option<usize> {
    let mut found = None;
    for (i, lib) in haystack.iter().enumerate() {
        if lib.name.match_name(&needle.name) {
            if found.is_some() {
                return None;
            }
            found = Some(i);
        }
    }
    found
}

/// Append, or replace the existing entry when the incoming version is strictly newer.
fn insert_or_upgrade(list: &mut Vec<Library>, library: &Library) {
    match find_library_by_name(list, library) {
        None => list.push(library.clone()),
        Some(index) => {
            let incoming = Version::new(library.name.version());
            let existing = Version::new(list[index].name.version());
            if incoming > existing {
                debug!("Replacing {} with {}", list[index].name, library.name);
                list[index] = library.clone();
            }
        }
    }
}

fn apply_string(from: &str, to: &mut String) {
    if !from.is_empty() {
        *to = from.to_string();
    }
}

impl LaunchProfile {
    /// Fold `patches` in ascending `order`; equal orders keep their list position.
    pub fn from_patches<'a>(
        patches: impl IntoIterator<Item = &'a VersionFile>,
        ctx: &RuntimeContext,
    ) -> Self {
        let mut sorted: Vec<&VersionFile> = patches.into_iter().collect();
        sorted.sort_by_key(|patch| patch.order);

        let mut profile = LaunchProfile::default();
        for patch in sorted {
            patch.apply_to(&mut profile, ctx);
        }
        profile
    }

    // ── Apply ───────────────────────────────────────────

    pub fn apply_minecraft_version(&mut self, id: &str) {
        apply_string(id, &mut self.minecraft_version);
    }

    pub fn apply_minecraft_version_type(&mut self, version_type: &str) {
        apply_string(version_type, &mut self.minecraft_version_type);
    }

    pub fn apply_minecraft_assets(&mut self, assets: Option<&MojangAssetIndexInfo>) {
        if let Some(assets) = assets {
            self.minecraft_assets = Some(assets.clone());
        }
    }

    pub fn apply_main_class(&mut self, main_class: &str) {
        apply_string(main_class, &mut self.main_class);
    }

    pub fn apply_applet_class(&mut self, applet_class: &str) {
        apply_string(applet_class, &mut self.applet_class);
    }

    pub fn apply_minecraft_arguments(&mut self, arguments: &str) {
        apply_string(arguments, &mut self.minecraft_arguments);
    }

    pub fn apply_add_jvm_arguments(&mut self, arguments: &[String]) {
        self.add_jvm_arguments.extend_from_slice(arguments);
    }

    /// Re-declared tweakers move to the end; new ones are appended after.
    pub fn apply_tweakers(&mut self, tweakers: &[String]) {
        self.tweakers.retain(|existing| !tweakers.contains(existing));
        self.tweakers.extend_from_slice(tweakers);
    }

    pub fn apply_jar_mods(&mut self, jar_mods: &[Library]) {
        self.jar_mods.extend_from_slice(jar_mods);
    }

    pub fn apply_mods(&mut self, mods: &[Library]) {
        for m in mods {
            insert_or_upgrade(&mut self.mods, m);
        }
    }

    pub fn apply_traits(&mut self, traits: &BTreeSet<String>) {
        self.traits.extend(traits.iter().cloned());
    }

    pub fn apply_compatible_java_majors(&mut self, majors: &[u32]) {
        self.compatible_java_majors.extend_from_slice(majors);
    }

    pub fn apply_library(&mut self, library: &Library, ctx: &RuntimeContext) {
        if !library.is_active(ctx) {
            return;
        }
        if library.is_native() {
            insert_or_upgrade(&mut self.native_libraries, library);
        } else {
            insert_or_upgrade(&mut self.libraries, library);
        }
    }

    /// Maven files are not on the classpath, so there is no version competition.
    pub fn apply_maven_file(&mut self, maven_file: &Library, ctx: &RuntimeContext) {
        if !maven_file.is_active(ctx) || maven_file.is_native() {
            return;
        }
        self.maven_files.push(maven_file.clone());
    }

    pub fn apply_agent(&mut self, agent: &Agent, ctx: &RuntimeContext) {
        if !agent.library.is_active(ctx) || agent.library.is_native() {
            return;
        }
        self.agents.push(agent.clone());
    }

    pub fn apply_main_jar(&mut self, jar: Option<&Library>) {
        if let Some(jar) = jar {
            self.main_jar = Some(jar.clone());
        }
    }

    pub fn apply_requirements(&mut self, requires: &RequireSet, conflicts: &RequireSet) {
        self.requires.extend(requires.iter().cloned());
        self.conflicts.extend(conflicts.iter().cloned());
    }

    pub fn apply_problem_severity(&mut self, severity: ProblemSeverity) {
        self.problems.raise_severity(severity);
    }

    pub fn add_problem(&mut self, severity: ProblemSeverity, description: impl Into<String>) {
        self.problems.add_problem(severity, description);
    }

    // ── Getters ─────────────────────────────────────────

    pub fn get_minecraft_version(&self) -> &str {
        &self.minecraft_version
    }

    pub fn get_minecraft_version_type(&self) -> &str {
        &self.minecraft_version_type
    }

    /// Asset index of the profile; versions that never declared one use `legacy`.
    pub fn get_minecraft_assets(&self) -> MojangAssetIndexInfo {
        self.minecraft_assets
            .clone()
            .unwrap_or_else(|| MojangAssetIndexInfo::from_id("legacy"))
    }

    pub fn get_minecraft_arguments(&self) -> &str {
        &self.minecraft_arguments
    }

    pub fn get_add_jvm_arguments(&self) -> &[String] {
        &self.add_jvm_arguments
    }

    pub fn get_tweakers(&self) -> &[String] {
        &self.tweakers
    }

    pub fn get_main_class(&self) -> &str {
        &self.main_class
    }

    pub fn get_applet_class(&self) -> &str {
        &self.applet_class
    }

    pub fn get_traits(&self) -> &BTreeSet<String> {
        &self.traits
    }

    pub fn has_trait(&self, name: &str) -> bool {
        self.traits.contains(name)
    }

    pub fn get_libraries(&self) -> &[Library] {
        &self.libraries
    }

    pub fn get_native_libraries(&self) -> &[Library] {
        &self.native_libraries
    }

    pub fn get_maven_files(&self) -> &[Library] {
        &self.maven_files
    }

    pub fn get_agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn get_main_jar(&self) -> Option<&Library> {
        self.main_jar.as_ref()
    }

    pub fn get_jar_mods(&self) -> &[Library] {
        &self.jar_mods
    }

    pub fn get_mods(&self) -> &[Library] {
        &self.mods
    }

    pub fn get_compatible_java_majors(&self) -> &[u32] {
        &self.compatible_java_majors
    }

    pub fn get_requires(&self) -> &RequireSet {
        &self.requires
    }

    pub fn get_conflicts(&self) -> &RequireSet {
        &self.conflicts
    }

    pub fn get_problems(&self) -> &ProblemContainer {
        &self.problems
    }

    pub fn get_problem_severity(&self) -> ProblemSeverity {
        self.problems.problem_severity()
    }

    /// Classpath jars and native jars, in launch order: libraries, then the main jar
    /// (or the patched `minecraft.jar` in `temp_path` when jar mods are present), then
    /// natives, then the 32/64-bit natives matching the Java architecture.
    pub fn get_library_files(
        &self,
        ctx: &RuntimeContext,
        override_path: Option<&Path>,
        temp_path: &Path,
        storage_root: &Path,
    ) -> (Vec<PathBuf>, Vec<PathBuf>) {
        let mut files = ApplicableFiles::default();
        for lib in &self.libraries {
            lib.get_applicable_files(ctx, &mut files, override_path, storage_root);
        }

        if let Some(main_jar) = &self.main_jar {
            if self.jar_mods.is_empty() {
                main_jar.get_applicable_files(ctx, &mut files, override_path, storage_root);
            } else {
                files.jar.push(temp_path.join("minecraft.jar"));
            }
        }

        for lib in &self.native_libraries {
            lib.get_applicable_files(ctx, &mut files, override_path, storage_root);
        }

        let ApplicableFiles {
            jar,
            mut native,
            native32,
            native64,
        } = files;
        match ctx.java_architecture.as_str() {
            "32" => native.extend(native32),
            "64" => native.extend(native64),
            _ => {}
        }
        (jar, native)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::maven::CoordinateSpecifier;
    use crate::core::rules::{Rule, RuleAction};
    use crate::core::version::MINECRAFT_UID;

    fn ctx() -> RuntimeContext {
        RuntimeContext::new("linux", "64", "x86_64")
    }

    fn lib(name: &str) -> Library {
        Library::new(CoordinateSpecifier::parse(name).unwrap())
    }

    fn patch(uid: &str, order: i32) -> VersionFile {
        VersionFile {
            uid: uid.to_string(),
            order,
            ..Default::default()
        }
    }

    #[test]
    fn higher_version_wins_in_either_order() {
        let mut old = patch("a", 0);
        old.libraries.push(lib("org.ow2.asm:asm:1.0"));
        let mut new = patch("b", 1);
        new.libraries.push(lib("org.ow2.asm:asm:2.0"));

        let forward = LaunchProfile::from_patches([&old, &new], &ctx());
        assert_eq!(forward.get_libraries().len(), 1);
        assert_eq!(forward.get_libraries()[0].name.version(), "2.0");

        old.order = 2;
        let backward = LaunchProfile::from_patches([&old, &new], &ctx());
        assert_eq!(backward.get_libraries().len(), 1);
        assert_eq!(backward.get_libraries()[0].name.version(), "2.0");
    }

    #[test]
    fn ambiguous_match_appends() {
        let mut profile = LaunchProfile::default();
        profile.libraries.push(lib("a:b:1"));
        profile.libraries.push(lib("a:b:2"));
        profile.apply_library(&lib("a:b:3"), &ctx());
        assert_eq!(profile.get_libraries().len(), 3);
    }

    #[test]
    fn only_minecraft_sets_version_and_assets() {
        let mut mc = patch(MINECRAFT_UID, -2);
        mc.minecraft_version = "1.12.2".to_string();
        mc.mojang_asset_index = Some(MojangAssetIndexInfo::from_id("1.12"));
        let mut other = patch("net.minecraftforge", 5);
        other.minecraft_version = "1.7.10".to_string();
        other.mojang_asset_index = Some(MojangAssetIndexInfo::from_id("bogus"));

        let profile = LaunchProfile::from_patches([&mc, &other], &ctx());
        assert_eq!(profile.get_minecraft_version(), "1.12.2");
        assert_eq!(profile.get_minecraft_assets().id, "1.12");
    }

    #[test]
    fn assets_default_to_legacy() {
        assert_eq!(LaunchProfile::default().get_minecraft_assets().id, "legacy");
    }

    #[test]
    fn scalars_apply_only_when_present() {
        let mut a = patch("a", 0);
        a.main_class = "net.minecraft.client.main.Main".to_string();
        a.minecraft_arguments = "--username x".to_string();
        let b = patch("b", 1);

        let profile = LaunchProfile::from_patches([&a, &b], &ctx());
        assert_eq!(profile.get_main_class(), "net.minecraft.client.main.Main");
        assert_eq!(profile.get_minecraft_arguments(), "--username x");
    }

    #[test]
    fn redeclared_tweaker_moves_later() {
        let mut profile = LaunchProfile::default();
        profile.apply_tweakers(&["A".to_string(), "B".to_string()]);
        profile.apply_tweakers(&["A".to_string(), "C".to_string()]);
        assert_eq!(profile.get_tweakers(), ["B", "A", "C"]);
    }

    #[test]
    fn every_mod_is_considered() {
        let mut profile = LaunchProfile::default();
        profile.apply_mods(&[lib("m:one:1"), lib("m:two:1")]);
        profile.apply_mods(&[lib("m:one:2"), lib("m:three:1")]);
        let names: Vec<_> = profile.get_mods().iter().map(|m| m.name.serialize()).collect();
        assert_eq!(names, vec!["m:one:2", "m:two:1", "m:three:1"]);
    }

    #[test]
    fn natives_are_kept_apart_and_inactive_libraries_dropped() {
        let mut native = lib("org.lwjgl.lwjgl:lwjgl-platform:2.9.4");
        native
            .native_classifiers
            .insert("linux".to_string(), "natives-linux".to_string());
        let mut mac_only = lib("ca.weblite:java-objc-bridge:1.0.0");
        mac_only.rules = vec![Rule::os(RuleAction::Allow, "osx")];

        let mut p = patch("org.lwjgl", -1);
        p.libraries = vec![lib("org.lwjgl.lwjgl:lwjgl:2.9.4"), native, mac_only];
        let profile = LaunchProfile::from_patches([&p], &ctx());
        assert_eq!(profile.get_libraries().len(), 1);
        assert_eq!(profile.get_native_libraries().len(), 1);
    }

    #[test]
    fn maven_files_append_without_dedupe() {
        let mut profile = LaunchProfile::default();
        profile.apply_maven_file(&lib("a:b:1"), &ctx());
        profile.apply_maven_file(&lib("a:b:1"), &ctx());
        assert_eq!(profile.get_maven_files().len(), 2);
    }

    #[test]
    fn traits_requirements_and_severity_accumulate() {
        let mut a = patch("a", 0);
        a.traits.insert("legacyLaunch".to_string());
        a.requires.insert(crate::core::version::Require::new("net.minecraft"));
        a.add_problem(ProblemSeverity::Warning, "old");
        let mut b = patch("b", 1);
        b.traits.insert("texturepacks".to_string());
        b.requires.insert(crate::core::version::Require::new("net.minecraft"));

        let profile = LaunchProfile::from_patches([&a, &b], &ctx());
        assert!(profile.has_trait("legacyLaunch"));
        assert!(profile.has_trait("texturepacks"));
        assert_eq!(profile.get_requires().len(), 1);
        assert_eq!(profile.get_problem_severity(), ProblemSeverity::Warning);
    }

    #[test]
    fn library_files_order_main_jar_after_libraries() {
        let mut native = lib("org.lwjgl.lwjgl:lwjgl-platform:2.9.4");
        native
            .native_classifiers
            .insert("linux".to_string(), "natives-linux-${arch}".to_string());
        let mut p = patch(MINECRAFT_UID, 0);
        p.libraries = vec![lib("a:first:1"), native];
        p.main_jar = Some(lib("com.mojang:minecraft:1.12.2:client"));

        let profile = LaunchProfile::from_patches([&p], &ctx());
        let (jars, natives) =
            profile.get_library_files(&ctx(), None, Path::new("/tmp/inst"), Path::new("/data"));
        assert_eq!(jars.len(), 2);
        assert!(jars[1].to_string_lossy().ends_with("minecraft-1.12.2-client.jar"));
        assert_eq!(natives.len(), 1);
        assert!(natives[0].to_string_lossy().ends_with("-64.jar"));

        let mut with_mods = p.clone();
        with_mods.jar_mods.push(lib("org.multimc.jarmods:x:1"));
        let profile = LaunchProfile::from_patches([&with_mods], &ctx());
        let (jars, _) =
            profile.get_library_files(&ctx(), None, Path::new("/tmp/inst"), Path::new("/data"));
        assert_eq!(jars[1], PathBuf::from("/tmp/inst/minecraft.jar"));
    }
}
