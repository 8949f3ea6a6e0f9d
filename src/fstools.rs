use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{BatchError, InputParseError};
use crate::media;

const OUTPUT_PREFIX: &str = "Compressed-";
const PROBE_FILE_NAME: &str = "test.tmp";

#[derive(Debug, PartialEq)]
pub enum DirEntryCategory {
    DoesNotExist,
    RegularFile,
    SymbolicLink,
    Directory,
    Unknown,
}

/// Symlinks are reported by what they point at; a dangling link is `SymbolicLink`.
pub fn classify_file(path: &Path) -> DirEntryCategory {
    match fs::metadata(path) {
        Ok(metadata) => {
            if metadata.is_file() {
                DirEntryCategory::RegularFile
            } else if metadata.is_dir() {
                DirEntryCategory::Directory
            } else {
                DirEntryCategory::Unknown
            }
        },
        Err(_) => match fs::symlink_metadata(path) {
            Ok(metadata) if metadata.is_symlink() => DirEntryCategory::SymbolicLink,
            _ => DirEntryCategory::DoesNotExist,
        },
    }
}

/// Keeps the accepted media files in the order given. Everything else is
/// logged and dropped.
pub fn select_media_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>, InputParseError> {
    let mut selected = vec![];
    for path in paths {
        match classify_file(path) {
            DirEntryCategory::RegularFile if media::is_accepted(path) => selected.push(path.clone()),
            DirEntryCategory::RegularFile => warn!("skipping {:?}: not an accepted media type", path),
            DirEntryCategory::DoesNotExist => warn!("skipping {:?}: does not exist", path),
            DirEntryCategory::Directory => warn!("skipping {:?}: is a directory", path),
            DirEntryCategory::SymbolicLink => warn!("skipping {:?}: dangling symlink", path),
            DirEntryCategory::Unknown => warn!("skipping {:?}: unable to classify", path),
        }
    }

    if selected.is_empty() {
        Err(InputParseError::NoInputs)
    } else {
        Ok(selected)
    }
}

/// Confirms write access by creating and removing a small probe file.
pub fn probe_writable(dir: &Path) -> Result<(), BatchError> {
    let dir_buf = dir.to_path_buf();
    if classify_file(dir) != DirEntryCategory::Directory {
        return Err(BatchError::permission_denied(&dir_buf, "not a directory"));
    }

    let probe = dir.join(PROBE_FILE_NAME);
    fs::write(&probe, "test")
        .and_then(|_| fs::remove_file(&probe))
        .map_err(|err| BatchError::permission_denied(&dir_buf, &err.to_string()))
}

/// Resolves `downloads`, `documents` and `desktop` to the user's folders.
pub fn predefined_folder(name: &str) -> Option<PathBuf> {
    let (resolved, fallback) = match name.to_lowercase().as_str() {
        "downloads" => (dirs::download_dir(), "Downloads"),
        "documents" => (dirs::document_dir(), "Documents"),
        "desktop" => (dirs::desktop_dir(), "Desktop"),
        _ => return None,
    };
    resolved.or_else(|| dirs::home_dir().map(|home| home.join(fallback)))
}

pub fn resolve_output_dir(arg: &str) -> PathBuf {
    predefined_folder(arg).unwrap_or_else(|| PathBuf::from(arg))
}

/// `<dir>/Compressed-<file name>`. Inputs sharing a file name collide.
pub fn output_path(dir: &Path, input: &Path) -> PathBuf {
    let mut name = OsString::from(OUTPUT_PREFIX);
    name.push(input.file_name().unwrap_or(input.as_os_str()));
    dir.join(name)
}

/// Access to the destination directory, held for the length of one batch
/// and released when dropped.
#[derive(Debug)]
pub struct OutputDirectory {
    path: PathBuf,
}

impl OutputDirectory {
    /// Checks that `path` exists, is a directory and is not flagged read-only.
    /// This does not prove the current user may write there; `probe_writable`
    /// does that.
    pub fn acquire(path: &Path) -> Result<Self, BatchError> {
        let path_buf = path.to_path_buf();
        let metadata = fs::metadata(path)
            .map_err(|err| BatchError::permission_denied(&path_buf, &err.to_string()))?;
        if !metadata.is_dir() {
            return Err(BatchError::permission_denied(&path_buf, "not a directory"));
        }
        if metadata.permissions().readonly() {
            return Err(BatchError::permission_denied(&path_buf, "read-only"));
        }

        debug!("acquired output directory {:?}", path);
        Ok(OutputDirectory { path: path_buf })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fails once the directory has gone away or stopped being one.
    pub fn verify(&self) -> Result<(), BatchError> {
        match classify_file(&self.path) {
            DirEntryCategory::Directory => Ok(()),
            _ => Err(BatchError::permission_denied(&self.path, "no longer accessible")),
        }
    }
}

impl Drop for OutputDirectory {
    fn drop(&mut self) {
        debug!("released output directory {:?}", self.path);
    }
}
