mod comparator;
pub mod mojang_format;
pub mod onesix_format;
mod problems;
mod require;
mod version_file;

pub use comparator::Version;
pub use problems::{PatchProblem, ProblemContainer, ProblemSeverity};
pub use require::{requires_from_json, Require, RequireSet};
pub use version_file::{MojangAssetIndexInfo, VersionFile, MINECRAFT_UID};
