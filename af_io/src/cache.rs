//! The working directory as a local cache of downloaded artifacts.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use af_core::{DownloadableArtifact, Error, PatternType};

use crate::checksum::FileChecksums;
use crate::traits::RemoteFileInfo;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheLookup {
    /// Nothing at the destination.
    Missing,
    /// The destination already has the remote content.
    Hit(FileChecksums),
    /// The destination holds other content and will be overwritten.
    Stale,
}

/// Compare the file at `dest` with what the server reports.
pub async fn lookup(dest: &Path, remote: &RemoteFileInfo) -> Result<CacheLookup, Error> {
    let metadata = match tokio::fs::metadata(dest).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(CacheLookup::Missing),
        Err(e) => return Err(Error::file_system(dest, e)),
    };
    if metadata.is_dir() {
        return Err(Error::DirectoryConflict {
            path: dest.to_path_buf(),
        });
    }

    let local = FileChecksums::compute_async(dest).await?;
    if local.matches(remote) {
        Ok(CacheLookup::Hit(local))
    } else {
        Ok(CacheLookup::Stale)
    }
}

/// Delete the siblings of every `Delete` artifact's destination that were
/// not produced by this run.
///
/// A sibling survives when it is a resolved destination or one of their
/// ancestors. Directories are only removed when empty. Returns the deleted
/// paths.
pub fn remove_unresolved(
    artifacts: &[DownloadableArtifact],
    working_dir: &Path,
    resolved: &HashSet<PathBuf>,
) -> Result<Vec<PathBuf>, Error> {
    let mut visited = HashSet::new();
    let mut deleted = Vec::new();

    for artifact in artifacts
        .iter()
        .filter(|a| a.pattern_type == PatternType::Delete)
    {
        let destination = artifact.destination(working_dir);
        let Some(dir) = destination.parent() else {
            continue;
        };
        if !visited.insert(dir.to_path_buf()) {
            continue;
        }
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(Error::file_system(dir, e)),
        };

        for entry in entries {
            let path = entry.map_err(|e| Error::file_system(dir, e))?.path();
            if resolved.iter().any(|r| r.starts_with(&path)) {
                continue;
            }
            if path.is_dir() {
                let empty = fs::read_dir(&path)
                    .map_err(|e| Error::file_system(&path, e))?
                    .next()
                    .is_none();
                if !empty {
                    debug!(path = %path.display(), "Kept unresolved non-empty directory");
                    continue;
                }
                fs::remove_dir(&path).map_err(|e| Error::file_system(&path, e))?;
            } else {
                fs::remove_file(&path).map_err(|e| Error::file_system(&path, e))?;
            }
            info!("Deleted unresolved file '{}'", path.display());
            deleted.push(path);
        }
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn remote_for(content: &[u8], tmp: &TempDir) -> RemoteFileInfo {
        let sample = tmp.path().join("sample");
        fs::write(&sample, content).unwrap();
        let sums = FileChecksums::compute(&sample).unwrap();
        fs::remove_file(&sample).unwrap();
        RemoteFileInfo {
            md5: Some(sums.md5),
            sha1: Some(sums.sha1),
            ..Default::default()
        }
    }

    // ========================================================================
    // lookup
    // ========================================================================

    #[tokio::test]
    async fn missing_destination() {
        let tmp = TempDir::new().unwrap();
        let lookup = lookup(&tmp.path().join("a.jar"), &RemoteFileInfo::default())
            .await
            .unwrap();
        assert_eq!(lookup, CacheLookup::Missing);
    }

    #[tokio::test]
    async fn matching_file_is_a_hit() {
        let tmp = TempDir::new().unwrap();
        let remote = remote_for(b"content", &tmp);
        let dest = tmp.path().join("a.jar");
        fs::write(&dest, b"content").unwrap();

        assert!(matches!(
            lookup(&dest, &remote).await.unwrap(),
            CacheLookup::Hit(_)
        ));
    }

    #[tokio::test]
    async fn different_file_is_stale() {
        let tmp = TempDir::new().unwrap();
        let remote = remote_for(b"content", &tmp);
        let dest = tmp.path().join("a.jar");
        fs::write(&dest, b"other").unwrap();

        assert_eq!(lookup(&dest, &remote).await.unwrap(), CacheLookup::Stale);
    }

    #[tokio::test]
    async fn directory_destination_conflicts() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("a.jar");
        fs::create_dir(&dest).unwrap();

        assert!(matches!(
            lookup(&dest, &RemoteFileInfo::default()).await,
            Err(Error::DirectoryConflict { .. })
        ));
    }

    // ========================================================================
    // remove_unresolved
    // ========================================================================

    #[test]
    fn deletes_only_unresolved_siblings() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("out");
        fs::create_dir_all(out.join("kept-dir")).unwrap();
        fs::create_dir_all(out.join("old-dir")).unwrap();
        fs::write(out.join("a.jar"), b"a").unwrap();
        fs::write(out.join("old.jar"), b"old").unwrap();
        fs::write(out.join("kept-dir/b.jar"), b"b").unwrap();

        let artifacts = vec![
            DownloadableArtifact::new("http://h/libs", "a.jar", "out")
                .with_pattern_type(PatternType::Delete),
        ];
        let resolved: HashSet<PathBuf> =
            [out.join("a.jar"), out.join("kept-dir/b.jar")].into_iter().collect();

        let mut deleted = remove_unresolved(&artifacts, tmp.path(), &resolved).unwrap();
        deleted.sort();

        assert_eq!(deleted, vec![out.join("old-dir"), out.join("old.jar")]);
        assert!(out.join("a.jar").exists());
        assert!(out.join("kept-dir/b.jar").exists());
    }

    #[test]
    fn non_empty_unrelated_directory_survives() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("out");
        fs::create_dir_all(out.join("docs/guide")).unwrap();
        fs::write(out.join("docs/guide/index.html"), b"<html>").unwrap();
        fs::write(out.join("a.jar"), b"a").unwrap();

        let artifacts = vec![
            DownloadableArtifact::new("http://h/libs", "a.jar", "out")
                .with_pattern_type(PatternType::Delete),
        ];
        let resolved: HashSet<PathBuf> = [out.join("a.jar")].into_iter().collect();

        let deleted = remove_unresolved(&artifacts, tmp.path(), &resolved).unwrap();

        assert!(deleted.is_empty());
        assert!(out.join("docs/guide/index.html").exists());
    }

    #[test]
    fn normal_artifacts_never_delete() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("old.jar"), b"old").unwrap();

        let artifacts = vec![DownloadableArtifact::new("http://h/libs", "a.jar", "")];
        let deleted = remove_unresolved(&artifacts, tmp.path(), &HashSet::new()).unwrap();

        assert!(deleted.is_empty());
        assert!(tmp.path().join("old.jar").exists());
    }

    #[test]
    fn name_prefix_is_not_an_ancestor() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("lib")).unwrap();
        fs::create_dir_all(tmp.path().join("libs")).unwrap();
        fs::write(tmp.path().join("libs/a.jar"), b"a").unwrap();

        let artifacts = vec![
            DownloadableArtifact::new("http://h/r", "x.jar", "")
                .with_pattern_type(PatternType::Delete),
        ];
        let resolved: HashSet<PathBuf> = [tmp.path().join("libs/a.jar")].into_iter().collect();

        let deleted = remove_unresolved(&artifacts, tmp.path(), &resolved).unwrap();
        assert_eq!(deleted, vec![tmp.path().join("lib")]);
    }
}
