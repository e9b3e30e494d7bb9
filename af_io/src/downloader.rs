//! Concurrent artifact downloads into the working directory.
//!
//! Each artifact is checked with a HEAD request first. A destination that
//! already holds the same md5 and sha1 is reused without a GET. Large files
//! on servers that accept ranges are fetched as three concurrent chunks.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use futures::future::try_join_all;
use futures::stream;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use af_core::config::CHUNK_COUNT;
use af_core::{Dependency, DownloadableArtifact, Error, PatternType, ResolverConfig};

use crate::cache::{self, CacheLookup};
use crate::checksum::FileChecksums;
use crate::extract;
use crate::progress::{DownloadProgress, ProgressCallback};
use crate::staging::PartFile;
use crate::traits::{ByteRange, HttpClient, RemoteFileInfo};

/// Split `size` bytes into [`CHUNK_COUNT`] contiguous inclusive ranges. The
/// remainder of the division goes to the first range. Files too small to
/// split come back as a single range, or none when empty.
fn chunk_ranges(size: u64) -> Vec<ByteRange> {
    if size < CHUNK_COUNT {
        return match size {
            0 => Vec::new(),
            _ => vec![ByteRange { start: 0, end: size - 1 }],
        };
    }
    let chunk = size / CHUNK_COUNT;
    let mut end = chunk + size % CHUNK_COUNT - 1;
    let mut ranges = vec![ByteRange { start: 0, end }];
    for _ in 1..CHUNK_COUNT {
        let start = end + 1;
        end += chunk;
        ranges.push(ByteRange { start, end });
    }
    ranges
}

pub struct Downloader {
    client: Arc<dyn HttpClient>,
    config: Arc<ResolverConfig>,
    progress: Option<ProgressCallback>,
}

impl Downloader {
    pub fn new(client: Arc<dyn HttpClient>, config: Arc<ResolverConfig>) -> Self {
        Self {
            client,
            config,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    fn emit(&self, event: DownloadProgress) {
        if let Some(progress) = &self.progress {
            progress(event);
        }
    }

    /// Download every artifact, then prune unresolved files next to `Delete`
    /// artifacts.
    ///
    /// Artifacts sharing a destination are reduced to the last one listed.
    /// Artifacts not yet started when one fails are skipped; the ones in
    /// flight are allowed to finish before the first error is returned.
    /// Dependencies come back sorted by local path.
    pub async fn download_all(
        &self,
        artifacts: &[DownloadableArtifact],
    ) -> Result<Vec<Dependency>, Error> {
        let artifacts = unique_destinations(artifacts, self.config.working_dir());
        let artifacts = artifacts.as_slice();
        let failed = AtomicBool::new(false);
        let failed = &failed;

        let outcomes: Vec<Result<Option<Dependency>, Error>> =
            stream::iter(artifacts.iter().map(|artifact| async move {
                if failed.load(Ordering::SeqCst) {
                    return Ok(None);
                }
                let outcome = self.download(artifact).await;
                if outcome.is_err() {
                    failed.store(true, Ordering::SeqCst);
                }
                outcome
            }))
            .buffer_unordered(self.config.concurrency())
            .collect()
            .await;

        let mut dependencies = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            if let Some(dependency) = outcome? {
                dependencies.push(dependency);
            }
        }
        dependencies.sort_by(|a, b| a.local_path.cmp(&b.local_path));

        let resolved: HashSet<PathBuf> = dependencies.iter().map(|d| d.local_path.clone()).collect();
        for path in cache::remove_unresolved(artifacts, self.config.working_dir(), &resolved)? {
            self.emit(DownloadProgress::Deleted { path });
        }

        Ok(dependencies)
    }

    /// Fetch one artifact. Folders resolve to `None`.
    pub async fn download(&self, artifact: &DownloadableArtifact) -> Result<Option<Dependency>, Error> {
        let url = artifact.download_url();
        let remote = self.client.head(&url).await?;
        if remote.is_directory() {
            debug!(url = %url, "No checksums reported, treating as a folder");
            self.emit(DownloadProgress::Skipped { url });
            return Ok(None);
        }

        let dest = artifact.destination(self.config.working_dir());
        match cache::lookup(&dest, &remote).await? {
            CacheLookup::Hit(local) => {
                info!("The file '{}' exists locally.", dest.display());
                self.emit(DownloadProgress::CacheHit { path: dest.clone() });
                return Ok(Some(dependency(artifact, dest, local, &remote)));
            }
            CacheLookup::Stale => {
                warn!(path = %dest.display(), "Overriding existing in destination file");
            }
            CacheLookup::Missing => {}
        }

        info!("Downloading '{}'...", url);
        self.emit(DownloadProgress::Started {
            url: url.clone(),
            total_bytes: (remote.size > 0).then_some(remote.size),
        });

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::file_system(parent, e))?;
        }

        let part = PartFile::new(&dest);
        if self.should_chunk(&remote) {
            self.download_chunked(&url, remote.size, part.path()).await?;
        } else {
            self.client.download(&url, None, part.path()).await?;
        }

        let local = FileChecksums::compute_async(part.path()).await?;
        local.verify(&remote, artifact.id())?;
        let dest = part.commit()?;
        info!("Successfully downloaded '{}' to '{}'", url, dest.display());
        self.emit(DownloadProgress::Completed {
            url,
            path: dest.clone(),
        });

        if artifact.explode {
            let archive = dest.clone();
            tokio::task::spawn_blocking(move || extract::explode(&archive))
                .await
                .map_err(|e| Error::ArchiveFailure {
                    path: dest.clone(),
                    message: e.to_string(),
                })??;
        }

        Ok(Some(dependency(artifact, dest, local, &remote)))
    }

    fn should_chunk(&self, remote: &RemoteFileInfo) -> bool {
        remote.accept_ranges
            && remote.size >= CHUNK_COUNT
            && remote.size >= self.config.chunk_threshold()
    }

    /// Fetch all ranges concurrently into a scratch directory, then append
    /// them to `dest` in order. Any chunk failure fails the whole file.
    async fn download_chunked(&self, url: &str, size: u64, dest: &Path) -> Result<(), Error> {
        let scratch_parent = dest.parent().unwrap_or(Path::new("."));
        let scratch = tempfile::Builder::new()
            .prefix(".af-chunks-")
            .tempdir_in(scratch_parent)
            .map_err(|e| Error::file_system(scratch_parent, e))?;

        let fetches = chunk_ranges(size).into_iter().enumerate().map(|(i, range)| {
            let chunk_path = scratch.path().join(format!("chunk-{i}"));
            async move {
                let written = self.client.download(url, Some(range), &chunk_path).await?;
                if written != range.len() {
                    return Err(Error::NetworkFailure {
                        message: format!(
                            "expected {} bytes for {}, got {written}",
                            range.len(),
                            range.header_value()
                        ),
                    });
                }
                Ok(chunk_path)
            }
        });
        let chunk_paths = try_join_all(fetches).await?;
        debug!(url = %url, chunks = chunk_paths.len(), "Merging chunks");

        let mut out = tokio::fs::File::create(dest)
            .await
            .map_err(|e| Error::file_system(dest, e))?;
        for chunk_path in &chunk_paths {
            let mut chunk = tokio::fs::File::open(chunk_path)
                .await
                .map_err(|e| Error::file_system(chunk_path, e))?;
            tokio::io::copy(&mut chunk, &mut out)
                .await
                .map_err(|e| Error::file_system(dest, e))?;
        }
        out.flush().await.map_err(|e| Error::file_system(dest, e))?;
        Ok(())
    }
}

/// One artifact per destination, the last listed winning. The survivor keeps
/// its first position and inherits `Delete` from the ones it replaces.
fn unique_destinations(
    artifacts: &[DownloadableArtifact],
    working_dir: &Path,
) -> Vec<DownloadableArtifact> {
    let mut unique: Vec<DownloadableArtifact> = Vec::with_capacity(artifacts.len());
    let mut by_destination: HashMap<PathBuf, usize> = HashMap::new();

    for artifact in artifacts {
        let destination = artifact.destination(working_dir);
        let Some(&index) = by_destination.get(&destination) else {
            by_destination.insert(destination, unique.len());
            unique.push(artifact.clone());
            continue;
        };

        let replaced = &unique[index];
        if replaced.download_url() != artifact.download_url() {
            warn!(
                path = %destination.display(),
                replaced = %replaced.download_url(),
                kept = %artifact.download_url(),
                "Several artifacts resolve to the same destination, keeping the last one"
            );
        }
        let mut survivor = artifact.clone();
        if replaced.pattern_type == PatternType::Delete {
            survivor.pattern_type = PatternType::Delete;
        }
        unique[index] = survivor;
    }

    unique
}

fn dependency(
    artifact: &DownloadableArtifact,
    local_path: PathBuf,
    local: FileChecksums,
    remote: &RemoteFileInfo,
) -> Dependency {
    Dependency {
        id: artifact.id().to_string(),
        local_path,
        remote_path: artifact.remote_path(),
        md5: local.md5,
        sha1: local.sha1,
        sha256: remote.sha256.as_ref().map(|_| local.sha256),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockHttpClient;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // ========================================================================
    // Chunk arithmetic
    // ========================================================================

    #[test]
    fn ranges_cover_file_exactly() {
        for size in [3u64, 10, 11, 5_120_000, 5_120_001, 5_120_002] {
            let ranges = chunk_ranges(size);
            assert_eq!(ranges.len(), 3);
            assert_eq!(ranges[0].start, 0);
            assert_eq!(ranges[2].end, size - 1);
            for pair in ranges.windows(2) {
                assert_eq!(pair[1].start, pair[0].end + 1);
            }
            assert_eq!(ranges.iter().map(ByteRange::len).sum::<u64>(), size);
        }
    }

    #[test]
    fn tiny_sizes_do_not_underflow() {
        assert!(chunk_ranges(0).is_empty());
        assert_eq!(chunk_ranges(1), vec![ByteRange { start: 0, end: 0 }]);
        assert_eq!(chunk_ranges(2), vec![ByteRange { start: 0, end: 1 }]);
    }

    #[test]
    fn remainder_goes_to_first_range() {
        assert_eq!(
            chunk_ranges(11),
            vec![
                ByteRange { start: 0, end: 4 },
                ByteRange { start: 5, end: 7 },
                ByteRange { start: 8, end: 10 },
            ]
        );
    }

    // ========================================================================
    // Shared destinations
    // ========================================================================

    #[test]
    fn last_artifact_wins_a_shared_destination() {
        let work = Path::new("/work");
        let artifacts = vec![
            DownloadableArtifact::new("http://repo/libs", "a/app.jar", "out/").with_flat(true),
            DownloadableArtifact::new("http://repo/libs", "other.jar", "out/").with_flat(true),
            DownloadableArtifact::new("http://repo/libs", "b/app.jar", "out/").with_flat(true),
        ];

        let unique = unique_destinations(&artifacts, work);

        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].file_path, "b/app.jar");
        assert_eq!(unique[1].file_path, "other.jar");
    }

    #[test]
    fn replaced_delete_marker_is_kept() {
        let work = Path::new("/work");
        let artifacts = vec![
            DownloadableArtifact::new("http://repo/libs", "a.jar", "out/")
                .with_pattern_type(PatternType::Delete),
            DownloadableArtifact::new("http://repo/libs", "a.jar", "out/").with_explode(true),
        ];

        let unique = unique_destinations(&artifacts, work);

        assert_eq!(unique.len(), 1);
        assert!(unique[0].explode);
        assert_eq!(unique[0].pattern_type, PatternType::Delete);
    }

    // ========================================================================
    // Downloader with a mocked transport
    // ========================================================================

    fn config(tmp: &TempDir) -> Arc<ResolverConfig> {
        Arc::new(ResolverConfig::new("http://repo", tmp.path()))
    }

    fn hello_remote() -> RemoteFileInfo {
        RemoteFileInfo {
            md5: Some("5d41402abc4b2a76b9719d911017c592".into()),
            sha1: Some("aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d".into()),
            sha256: None,
            size: 5,
            accept_ranges: false,
        }
    }

    #[tokio::test]
    async fn folder_is_skipped_without_get() {
        let tmp = TempDir::new().unwrap();
        let mut mock = MockHttpClient::new();
        mock.expect_head()
            .returning(|_| Ok(RemoteFileInfo::default()));
        mock.expect_download().times(0);

        let downloader = Downloader::new(Arc::new(mock), config(&tmp));
        let artifact = DownloadableArtifact::new("http://repo/libs", "folder", "");
        assert_eq!(downloader.download(&artifact).await.unwrap(), None);
    }

    #[tokio::test]
    async fn cache_hit_skips_get() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("hello.txt"), b"hello").unwrap();

        let mut mock = MockHttpClient::new();
        mock.expect_head().returning(|_| Ok(hello_remote()));
        mock.expect_download().times(0);

        let downloader = Downloader::new(Arc::new(mock), config(&tmp));
        let artifact = DownloadableArtifact::new("http://repo/libs", "hello.txt", "");
        let dependency = downloader.download(&artifact).await.unwrap().unwrap();

        assert_eq!(dependency.local_path, tmp.path().join("hello.txt"));
        assert_eq!(dependency.remote_path, "http://repo/libs/hello.txt");
        assert_eq!(dependency.id, "hello.txt");
    }

    #[tokio::test]
    async fn checksum_mismatch_leaves_no_file() {
        let tmp = TempDir::new().unwrap();
        let mut mock = MockHttpClient::new();
        mock.expect_head().returning(|_| Ok(hello_remote()));
        mock.expect_download().returning(|_, _, dest| {
            std::fs::write(dest, b"HELLO").unwrap();
            Ok(5)
        });

        let downloader = Downloader::new(Arc::new(mock), config(&tmp));
        let artifact = DownloadableArtifact::new("http://repo/libs", "hello.txt", "");
        let result = downloader.download(&artifact).await;

        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
        assert!(!tmp.path().join("hello.txt").exists());
        assert!(!tmp.path().join("hello.txt.part").exists());
    }

    #[tokio::test]
    async fn stale_file_is_overwritten() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("hello.txt"), b"stale").unwrap();

        let mut mock = MockHttpClient::new();
        mock.expect_head().returning(|_| Ok(hello_remote()));
        mock.expect_download().times(1).returning(|_, _, dest| {
            std::fs::write(dest, b"hello").unwrap();
            Ok(5)
        });

        let downloader = Downloader::new(Arc::new(mock), config(&tmp));
        let artifact = DownloadableArtifact::new("http://repo/libs", "hello.txt", "");
        downloader.download(&artifact).await.unwrap();

        assert_eq!(std::fs::read(tmp.path().join("hello.txt")).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn first_error_aborts_and_skips_queued_artifacts() {
        let tmp = TempDir::new().unwrap();
        let heads = Arc::new(Mutex::new(Vec::new()));
        let seen = heads.clone();

        let mut mock = MockHttpClient::new();
        mock.expect_head().returning(move |url| {
            seen.lock().unwrap().push(url.to_string());
            Err(Error::NetworkFailure {
                message: "boom".into(),
            })
        });

        let config = Arc::new(ResolverConfig::new("http://repo", tmp.path()).with_concurrency(1));
        let downloader = Downloader::new(Arc::new(mock), config);
        let artifacts = vec![
            DownloadableArtifact::new("http://repo/libs", "a.jar", ""),
            DownloadableArtifact::new("http://repo/libs", "b.jar", ""),
        ];

        let result = downloader.download_all(&artifacts).await;
        assert!(matches!(result, Err(Error::NetworkFailure { .. })));
        assert_eq!(heads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn colliding_artifacts_download_once() {
        let tmp = TempDir::new().unwrap();
        let mut mock = MockHttpClient::new();
        mock.expect_head()
            .withf(|url| url == "http://repo/libs/b/hello.txt")
            .times(1)
            .returning(|_| Ok(hello_remote()));
        mock.expect_download().times(1).returning(|_, _, dest| {
            std::fs::write(dest, b"hello").unwrap();
            Ok(5)
        });

        let downloader = Downloader::new(Arc::new(mock), config(&tmp));
        let artifacts = vec![
            DownloadableArtifact::new("http://repo/libs", "a/hello.txt", "").with_flat(true),
            DownloadableArtifact::new("http://repo/libs", "b/hello.txt", "").with_flat(true),
        ];
        let dependencies = downloader.download_all(&artifacts).await.unwrap();

        assert_eq!(dependencies.len(), 1);
        assert_eq!(dependencies[0].remote_path, "http://repo/libs/b/hello.txt");
        assert_eq!(std::fs::read(tmp.path().join("hello.txt")).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn failed_chunk_fails_the_file() {
        let tmp = TempDir::new().unwrap();
        let mut mock = MockHttpClient::new();
        mock.expect_head().returning(|_| {
            Ok(RemoteFileInfo {
                size: 30,
                accept_ranges: true,
                ..hello_remote()
            })
        });
        mock.expect_download().returning(|_, range, dest| {
            let range = range.expect("chunked download sends ranges");
            if range.start == 0 {
                return Err(Error::NetworkFailure {
                    message: "reset".into(),
                });
            }
            std::fs::write(dest, vec![0u8; range.len() as usize]).unwrap();
            Ok(range.len())
        });

        let config = Arc::new(ResolverConfig::new("http://repo", tmp.path()).with_chunk_threshold(10));
        let downloader = Downloader::new(Arc::new(mock), config);
        let artifact = DownloadableArtifact::new("http://repo/libs", "big.bin", "");

        assert!(matches!(
            downloader.download(&artifact).await,
            Err(Error::NetworkFailure { .. })
        ));
        let leftovers: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
        assert!(leftovers.is_empty(), "no partial files should remain");
    }
}
