mod download_info;
mod artifact;

pub use download_info::{
    downloads_from_json, MojangDownloadInfo, MojangDownloads, MojangLibraryDownloadInfo,
};
pub use artifact::{Agent, ApplicableFiles, Library, HINT_ALWAYS_STALE, HINT_LOCAL};
