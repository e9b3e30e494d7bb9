use std::path::PathBuf;
use std::sync::Arc;

/// Events emitted while artifacts are fetched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DownloadProgress {
    Started {
        url: String,
        total_bytes: Option<u64>,
    },
    /// The destination already held the right bytes.
    CacheHit { path: PathBuf },
    Completed { url: String, path: PathBuf },
    /// The remote path is a folder.
    Skipped { url: String },
    Deleted { path: PathBuf },
}

pub type ProgressCallback = Arc<dyn Fn(DownloadProgress) + Send + Sync>;
