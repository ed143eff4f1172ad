mod cache;
mod client;
mod job;
mod lock;

pub use cache::{FileMetaCache, MetaCache, MetaEntry};
pub use client::{DownloadRequest, Downloader};
pub use job::{DownloadJob, HttpDownloadJob, JobEvent, JobOutcome, NetMode};
pub use lock::{lock_path_for, CacheLock};

