use std::fmt;
use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    InvalidPattern {
        pattern: String,
        reason: String,
    },
    InvalidProperties {
        props: String,
    },
    InvalidBuild {
        build: String,
        reason: String,
    },
    InvalidSpec {
        message: String,
    },
    ChecksumMismatch {
        algorithm: ChecksumAlgorithm,
        expected: String,
        actual: String,
        file_name: Option<String>,
    },
    DirectoryConflict {
        path: PathBuf,
    },
    NetworkFailure {
        message: String,
    },
    SearchFailure {
        message: String,
    },
    FileSystem {
        path: PathBuf,
        message: String,
    },
    ArchiveFailure {
        path: PathBuf,
        message: String,
    },
}

/// Digest used to verify a downloaded file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChecksumAlgorithm::Md5 => write!(f, "MD5"),
            ChecksumAlgorithm::Sha1 => write!(f, "SHA-1"),
            ChecksumAlgorithm::Sha256 => write!(f, "SHA-256"),
        }
    }
}

impl Error {
    /// Shorthand for wrapping an `io::Error` that happened at `path`.
    pub fn file_system(path: impl Into<PathBuf>, err: impl fmt::Display) -> Self {
        Error::FileSystem {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidPattern { pattern, reason } => {
                write!(
                    f,
                    "invalid search pattern '{}': {}\n  hint: patterns look like 'repo/path/*.jar'",
                    pattern, reason
                )
            }
            Error::InvalidProperties { props } => {
                write!(
                    f,
                    "invalid properties filter '{}'\n  hint: use 'key1=value1;key2=value2'",
                    props
                )
            }
            Error::InvalidBuild { build, reason } => {
                write!(
                    f,
                    "invalid build '{}': {}\n  hint: use 'name/number' and escape slashes inside the name as '\\/'",
                    build, reason
                )
            }
            Error::InvalidSpec { message } => {
                write!(f, "invalid download spec: {}", message)
            }
            Error::ChecksumMismatch {
                algorithm,
                expected,
                actual,
                file_name,
            } => {
                write!(f, "{} checksum verification failed", algorithm)?;
                if let Some(name) = file_name {
                    write!(f, " for '{}'", name)?;
                }
                write!(f, "\n  expected: {}\n  got:      {}", expected, actual)?;
                write!(
                    f,
                    "\n  hint: the download may be corrupted or the artifact changed remotely; try again"
                )
            }
            Error::DirectoryConflict { path } => {
                write!(
                    f,
                    "cannot download to '{}' (a directory already exists there)\n  hint: remove the directory or choose another target",
                    path.to_string_lossy()
                )
            }
            Error::NetworkFailure { message } => {
                write!(
                    f,
                    "network error: {}\n  hint: check the repository URL and your connection, then try again",
                    message
                )
            }
            Error::SearchFailure { message } => {
                write!(f, "search request failed: {}", message)
            }
            Error::FileSystem { path, message } => {
                write!(f, "filesystem error at '{}': {}", path.to_string_lossy(), message)
            }
            Error::ArchiveFailure { path, message } => {
                write!(
                    f,
                    "failed to extract '{}': {}\n  hint: only zip, tar and tar.gz archives can be exploded",
                    path.to_string_lossy(),
                    message
                )
            }
        }
    }
}

impl std::error::Error for Error {}
