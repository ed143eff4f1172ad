// ─── Profile Launch Core ───
// Version profile resolution and staged launching for Minecraft instances.
//
// Architecture:
//   core/
//     maven/      Library coordinates and repository paths
//     rules/      OS rules and the runtime context they match against
//     library/    Library descriptors, natives and agents
//     version/    Version files, requirements and patch problems
//     profile/    Component list and the merged launch profile
//     downloader/ Concurrent downloads, metadata cache and cache locks
//     assets/     Asset indexes, object downloads and reconstruction
//     settings/   Layered settings with overrides and passthroughs
//     java/       Java probing and version parsing
//     launch/     Launch task, steps and the launcher part protocol
//     instance/   Minecraft instance, sessions and server targets

pub mod assets;
pub mod downloader;
pub mod error;
pub(crate) mod http;
pub mod instance;
pub mod java;
pub mod launch;
pub mod library;
pub mod maven;
pub(crate) mod pattern;
pub mod profile;
pub mod rules;
pub mod settings;
pub mod version;
