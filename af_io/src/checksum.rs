use std::fs::File;
use std::io::Read;
use std::path::Path;

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use af_core::{ChecksumAlgorithm, Error};

use crate::traits::RemoteFileInfo;

const BUFFER_SIZE: usize = 64 * 1024;

/// Hex digests of a local file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileChecksums {
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
}

impl FileChecksums {
    /// Hash `path` in a single pass.
    pub fn compute(path: &Path) -> Result<Self, Error> {
        let mut file = File::open(path).map_err(|e| Error::file_system(path, e))?;
        let mut md5 = Md5::new();
        let mut sha1 = Sha1::new();
        let mut sha256 = Sha256::new();
        let mut buffer = vec![0u8; BUFFER_SIZE];

        loop {
            let n = file
                .read(&mut buffer)
                .map_err(|e| Error::file_system(path, e))?;
            if n == 0 {
                break;
            }
            md5.update(&buffer[..n]);
            sha1.update(&buffer[..n]);
            sha256.update(&buffer[..n]);
        }

        Ok(Self {
            md5: format!("{:x}", md5.finalize()),
            sha1: format!("{:x}", sha1.finalize()),
            sha256: format!("{:x}", sha256.finalize()),
        })
    }

    /// Hash on the blocking pool.
    pub async fn compute_async(path: &Path) -> Result<Self, Error> {
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::compute(&owned))
            .await
            .map_err(|e| Error::file_system(path, e))?
    }

    /// Both md5 and sha1 reported by the server match.
    pub fn matches(&self, remote: &RemoteFileInfo) -> bool {
        remote
            .md5
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case(&self.md5))
            && remote
                .sha1
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(&self.sha1))
    }

    /// Check the downloaded file against the server's checksums. md5 and
    /// sha1 are required; sha256 is checked when reported.
    pub fn verify(&self, remote: &RemoteFileInfo, file_name: &str) -> Result<(), Error> {
        let pairs = [
            (ChecksumAlgorithm::Md5, remote.md5.as_deref(), &self.md5, true),
            (ChecksumAlgorithm::Sha1, remote.sha1.as_deref(), &self.sha1, true),
            (ChecksumAlgorithm::Sha256, remote.sha256.as_deref(), &self.sha256, false),
        ];
        for (algorithm, expected, actual, required) in pairs {
            let matches = match expected {
                Some(expected) => expected.eq_ignore_ascii_case(actual),
                None => !required,
            };
            if !matches {
                return Err(Error::ChecksumMismatch {
                    algorithm,
                    expected: expected.unwrap_or_default().to_string(),
                    actual: actual.clone(),
                    file_name: Some(file_name.to_string()),
                });
            }
        }
        Ok(())
    }
}
