//! Read-only handle to the file under analysis.

use crate::{Error, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A media file opened for analysis.
///
/// The file is never written through this handle; all repair output goes to
/// new files.
#[derive(Debug, Clone)]
pub struct MediaFile {
    /// Path to the file.
    pub path: PathBuf,
    /// Total length in bytes.
    pub len: u64,
    /// Last modification time, if the filesystem reports one.
    pub modified: Option<SystemTime>,
}

impl MediaFile {
    /// Open a file for analysis.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileNotFound`] if the path does not point at a regular
    /// file and [`Error::EmptyFile`] if it has zero length. Both are fatal for
    /// this file only; no repair is attempted on unreadable input.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let meta = std::fs::metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::file_not_found(path)
            } else {
                Error::Io(e)
            }
        })?;

        if !meta.is_file() {
            return Err(Error::file_not_found(path));
        }
        if meta.len() == 0 {
            return Err(Error::empty_file(path));
        }

        Ok(Self {
            path: path.to_path_buf(),
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }

    /// Open a fresh read-only handle on the underlying file.
    pub fn reader(&self) -> Result<File> {
        Ok(File::open(&self.path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn open_missing_file_fails() {
        let err = MediaFile::open("/nonexistent/mediamend-test.mp4").unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    #[test]
    fn open_empty_file_fails() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = MediaFile::open(file.path()).unwrap_err();
        assert!(matches!(err, Error::EmptyFile { .. }));
    }

    #[test]
    fn open_reports_length() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();
        let media = MediaFile::open(file.path()).unwrap();
        assert_eq!(media.len, 10);
    }
}
