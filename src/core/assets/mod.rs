mod asset_index;
mod update;

pub use asset_index::{assets_dir_for, index_path, AssetObject, AssetsIndex, ReconstructReport, RESOURCE_BASE};
pub use update::AssetUpdateJob;
