// ─── Version File ───
// One version patch: a layer of launch configuration contributed by a component.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::problems::{ProblemContainer, ProblemSeverity};
use super::require::RequireSet;
use crate::core::library::{Agent, Library, MojangDownloads};
use crate::core::profile::LaunchProfile;
use crate::core::rules::RuntimeContext;

pub const MINECRAFT_UID: &str = "net.minecraft";

/// Where the asset index for a Minecraft version lives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MojangAssetIndexInfo {
    pub id: String,
    pub sha1: String,
    pub size: u64,
    pub total_size: u64,
    pub url: String,
    /// False when only the legacy `assets` id was given and the URL is a guess.
    pub known: bool,
}

impl MojangAssetIndexInfo {
    /// Info reconstructed from a bare `assets` id.
    pub fn from_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            url: format!("https://s3.amazonaws.com/Minecraft.Download/indexes/{}.json", id),
            known: false,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VersionFile {
    pub problems: ProblemContainer,

    pub order: i32,
    pub name: String,
    pub uid: String,
    pub version: String,
    /// `mcVersion` of a non-Minecraft component.
    pub depends_on_minecraft_version: String,

    pub main_class: String,
    pub applet_class: String,
    pub minecraft_arguments: String,
    pub add_jvm_arguments: Vec<String>,

    /// `id` of a Mojang version file.
    pub minecraft_version: String,
    /// `release`, `snapshot`, `old_alpha` ...
    pub version_type: String,
    pub release_time: Option<DateTime<Utc>>,
    pub updated_time: Option<DateTime<Utc>>,
    pub assets: String,
    pub minimum_launcher_version: i64,
    pub mojang_downloads: MojangDownloads,
    pub mojang_asset_index: Option<MojangAssetIndexInfo>,

    pub tweakers: Vec<String>,
    pub main_jar: Option<Library>,
    pub libraries: Vec<Library>,
    pub maven_files: Vec<Library>,
    pub agents: Vec<Agent>,
    pub jar_mods: Vec<Library>,
    pub mods: Vec<Library>,
    pub traits: BTreeSet<String>,
    pub compatible_java_majors: Vec<u32>,
    pub compatible_java_name: String,

    pub requires: RequireSet,
    pub conflicts: RequireSet,
    /// Volatile components may be removed automatically when nothing requires them.
    pub is_volatile: bool,
}

impl VersionFile {
    pub fn add_problem(&mut self, severity: ProblemSeverity, description: impl Into<String>) {
        self.problems.add_problem(severity, description);
    }

    pub fn problem_severity(&self) -> ProblemSeverity {
        self.problems.problem_severity()
    }

    /// Fold this patch into `profile`, in the fixed field order.
    pub fn apply_to(&self, profile: &mut LaunchProfile, ctx: &RuntimeContext) {
        // Only Minecraft itself may set the version and assets.
        if self.uid == MINECRAFT_UID {
            profile.apply_minecraft_version(&self.minecraft_version);
            profile.apply_minecraft_version_type(&self.version_type);
            profile.apply_minecraft_assets(self.mojang_asset_index.as_ref());
        }

        profile.apply_main_jar(self.main_jar.as_ref());
        profile.apply_main_class(&self.main_class);
        profile.apply_applet_class(&self.applet_class);
        profile.apply_minecraft_arguments(&self.minecraft_arguments);
        profile.apply_add_jvm_arguments(&self.add_jvm_arguments);
        profile.apply_tweakers(&self.tweakers);
        profile.apply_jar_mods(&self.jar_mods);
        profile.apply_mods(&self.mods);
        profile.apply_traits(&self.traits);
        profile.apply_compatible_java_majors(&self.compatible_java_majors);

        for library in &self.libraries {
            profile.apply_library(library, ctx);
        }
        for maven_file in &self.maven_files {
            profile.apply_maven_file(maven_file, ctx);
        }
        for agent in &self.agents {
            profile.apply_agent(agent, ctx);
        }
        profile.apply_requirements(&self.requires, &self.conflicts);
        profile.apply_problem_severity(self.problem_severity());
    }
}
