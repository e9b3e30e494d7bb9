pub mod cache;
pub mod checksum;
pub mod downloader;
pub mod extract;
pub mod progress;
pub mod repository;
pub mod resolver;
pub mod staging;
pub mod traits;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use cache::CacheLookup;
pub use checksum::FileChecksums;
pub use downloader::Downloader;
pub use extract::{ArchiveKind, explode};
pub use progress::{DownloadProgress, ProgressCallback};
pub use repository::{HttpRepository, Repository};
pub use resolver::Resolver;
pub use traits::{ByteRange, HttpClient, RemoteFileInfo, ReqwestHttpClient};
