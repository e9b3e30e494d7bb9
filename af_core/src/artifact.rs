use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::provenance::SearchResultEntry;

/// Whether the artifact only resolves, or also prunes siblings that were not
/// resolved in the same run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PatternType {
    #[default]
    Normal,
    Delete,
}

/// A fully resolved file to fetch from the repository.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DownloadableArtifact {
    /// Repository URL, e.g. `https://host/artifactory/libs-release`.
    pub repo_url: String,
    /// Path of the file inside the repository.
    pub file_path: String,
    /// Directory under the working directory to download into.
    pub target_dir: String,
    /// Path of the file under `target_dir`.
    pub relative_path: String,
    /// Matrix parameters appended to the download URL as `;key=value`.
    pub matrix_params: String,
    pub pattern_type: PatternType,
    pub explode: bool,
    pub flat: bool,
}

impl DownloadableArtifact {
    pub fn new(
        repo_url: impl Into<String>,
        file_path: impl Into<String>,
        target_dir: impl Into<String>,
    ) -> Self {
        let file_path = file_path.into();
        Self {
            repo_url: repo_url.into(),
            relative_path: file_path.clone(),
            file_path,
            target_dir: target_dir.into(),
            matrix_params: String::new(),
            pattern_type: PatternType::Normal,
            explode: false,
            flat: false,
        }
    }

    pub fn from_search_result(base_url: &str, entry: &SearchResultEntry, target_dir: &str) -> Self {
        let repo_url = format!("{}/{}", base_url.trim_end_matches('/'), entry.repo);
        Self::new(repo_url, entry.relative_path(), target_dir)
    }

    pub fn with_explode(mut self, explode: bool) -> Self {
        self.explode = explode;
        self
    }

    pub fn with_flat(mut self, flat: bool) -> Self {
        self.flat = flat;
        self
    }

    pub fn with_pattern_type(mut self, pattern_type: PatternType) -> Self {
        self.pattern_type = pattern_type;
        self
    }

    pub fn with_matrix_params(mut self, matrix_params: impl Into<String>) -> Self {
        self.matrix_params = matrix_params.into();
        self
    }

    /// Repository name, the last segment of the repository URL.
    pub fn repo_name(&self) -> &str {
        self.repo_url
            .rsplit_once('/')
            .map_or(self.repo_url.as_str(), |(_, name)| name)
    }

    pub fn remote_path(&self) -> String {
        format!("{}/{}", self.repo_url, self.file_path)
    }

    pub fn download_url(&self) -> String {
        if self.matrix_params.trim().is_empty() {
            self.remote_path()
        } else {
            format!("{};{}", self.remote_path(), self.matrix_params)
        }
    }

    /// Logical id of the resulting dependency: the file name.
    pub fn id(&self) -> &str {
        file_name(&self.file_path)
    }

    /// Local destination: `working_dir/target_dir/relative_path`, or only the
    /// file name under `target_dir` for flat downloads.
    pub fn destination(&self, working_dir: &Path) -> PathBuf {
        let relative = if self.flat {
            file_name(&self.relative_path)
        } else {
            self.relative_path.as_str()
        };
        working_dir.join(&self.target_dir).join(relative)
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, name)| name)
}

/// A downloaded (or already present) artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Dependency {
    pub id: String,
    pub local_path: PathBuf,
    pub remote_path: String,
    pub md5: String,
    pub sha1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}
