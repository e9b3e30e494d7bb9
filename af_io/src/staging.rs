use std::fs;
use std::path::{Path, PathBuf};

use af_core::Error;

/// A download in progress, written next to its final destination.
///
/// The data only appears under the final name after [`PartFile::commit`];
/// dropping an uncommitted part file removes it.
pub struct PartFile {
    tmp_path: PathBuf,
    final_path: PathBuf,
    committed: bool,
}

impl PartFile {
    pub fn new(final_path: &Path) -> Self {
        let mut name = final_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".part");
        Self {
            tmp_path: final_path.with_file_name(name),
            final_path: final_path.to_path_buf(),
            committed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.tmp_path
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Move the part file over the destination.
    pub fn commit(mut self) -> Result<PathBuf, Error> {
        if self.final_path.is_file() {
            fs::remove_file(&self.final_path).map_err(|e| Error::file_system(&self.final_path, e))?;
        }
        fs::rename(&self.tmp_path, &self.final_path)
            .map_err(|e| Error::file_system(&self.final_path, e))?;
        self.committed = true;
        Ok(self.final_path.clone())
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if !self.committed && self.tmp_path.exists() {
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}
