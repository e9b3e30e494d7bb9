//! Exploding downloaded archives in place.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::{debug, info};

use af_core::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Tar,
    TarGz,
}

impl ArchiveKind {
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else if name.ends_with(".tar") {
            Some(ArchiveKind::Tar)
        } else if name.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else {
            None
        }
    }
}

/// Extract `archive` into its parent directory and delete it.
///
/// Returns `false` when the file is not a supported archive; it is then left
/// untouched.
pub fn explode(archive: &Path) -> Result<bool, Error> {
    let Some(kind) = ArchiveKind::detect(archive) else {
        debug!(path = %archive.display(), "Not an archive, skipping extraction");
        return Ok(false);
    };
    let dest = archive.parent().unwrap_or(Path::new("."));

    info!("Extracting '{}'", archive.display());
    match kind {
        ArchiveKind::Zip => extract_zip(archive, dest)?,
        ArchiveKind::Tar => extract_tar(open(archive)?, archive, dest)?,
        ArchiveKind::TarGz => extract_tar(GzDecoder::new(open(archive)?), archive, dest)?,
    }

    std::fs::remove_file(archive).map_err(|e| Error::file_system(archive, e))?;
    Ok(true)
}

fn open(path: &Path) -> Result<BufReader<File>, Error> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| Error::file_system(path, e))
}

fn archive_error(path: &Path, message: impl std::fmt::Display) -> Error {
    Error::ArchiveFailure {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

fn extract_tar<R: Read>(reader: R, archive_path: &Path, dest: &Path) -> Result<(), Error> {
    let mut archive = tar::Archive::new(reader);
    let entries = archive
        .entries()
        .map_err(|e| archive_error(archive_path, e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| archive_error(archive_path, e))?;
        // unpack_in refuses entries that would land outside dest
        let unpacked = entry
            .unpack_in(dest)
            .map_err(|e| archive_error(archive_path, e))?;
        if !unpacked {
            debug!(archive = %archive_path.display(), "Skipped unsafe tar entry");
        }
    }
    Ok(())
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<(), Error> {
    let file = File::open(archive_path).map_err(|e| Error::file_system(archive_path, e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| archive_error(archive_path, e))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| archive_error(archive_path, e))?;
        let Some(relative) = entry.enclosed_name() else {
            debug!(archive = %archive_path.display(), "Skipped unsafe zip entry");
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| Error::file_system(&out_path, e))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::file_system(parent, e))?;
        }
        let mut out = File::create(&out_path).map_err(|e| Error::file_system(&out_path, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| Error::file_system(&out_path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode)).ok();
            }
        }
    }
    Ok(())
}
