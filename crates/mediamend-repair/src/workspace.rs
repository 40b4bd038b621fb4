//! Per-file temporary workspace for repair attempts.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Scratch space for one file's repair session.
///
/// Candidate files live inside a temporary directory whose name is scoped to
/// the input's identity, so a future concurrent mode cannot collide. Nothing
/// is moved to a final destination here except through [`promote`], which is
/// only called after verification passes; dropping the workspace removes
/// every leftover candidate.
///
/// [`promote`]: RepairWorkspace::promote
pub struct RepairWorkspace {
    temp_dir: TempDir,
    tag: String,
}

impl RepairWorkspace {
    /// Create a workspace for the given input file.
    ///
    /// `temp_root` overrides the system temp directory when set.
    pub fn new(input: &Path, temp_root: Option<&Path>) -> Result<Self> {
        let tag = sanitize_tag(
            input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "input".to_string()),
        );

        let mut builder = tempfile::Builder::new();
        let prefix = format!("mediamend-{tag}-");
        builder.prefix(&prefix);

        let temp_dir = match temp_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| Error::Workspace(e.to_string()))?;

        Ok(Self { temp_dir, tag })
    }

    /// Path of the temp directory.
    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path for a candidate or intermediate file inside the workspace.
    pub fn candidate(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(format!("{}.{name}", self.tag))
    }

    /// Move a verified candidate to its final destination.
    ///
    /// Falls back to copy-and-delete when a rename crosses filesystems.
    pub fn promote(&self, candidate: &Path, dest: &Path) -> Result<()> {
        if !candidate.exists() {
            return Err(Error::Workspace(format!(
                "candidate does not exist: {}",
                candidate.display()
            )));
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        match std::fs::rename(candidate, dest) {
            Ok(()) => Ok(()),
            Err(_) => {
                std::fs::copy(candidate, dest)?;
                let _ = std::fs::remove_file(candidate);
                Ok(())
            }
        }
    }

    /// Remove a rejected candidate; missing files are fine.
    pub fn discard(&self, candidate: &Path) {
        let _ = std::fs::remove_file(candidate);
    }
}

fn sanitize_tag(raw: String) -> String {
    let tag: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(48)
        .collect();
    if tag.is_empty() {
        "input".to_string()
    } else {
        tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn candidate_paths_are_scoped_to_input_identity() {
        let ws = RepairWorkspace::new(Path::new("/videos/holiday clip.mp4"), None).unwrap();
        let path = ws.candidate("remux.mp4");
        assert!(path.starts_with(ws.dir()));
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("holiday_clip."));
    }

    #[test]
    fn promote_moves_candidate_to_destination() {
        let ws = RepairWorkspace::new(Path::new("in.mp4"), None).unwrap();
        let candidate = ws.candidate("fixed.mp4");
        std::fs::File::create(&candidate)
            .unwrap()
            .write_all(b"data")
            .unwrap();

        let dest_dir = tempfile::tempdir().unwrap();
        let dest = dest_dir.path().join("out/final.mp4");
        ws.promote(&candidate, &dest).unwrap();

        assert!(dest.exists());
        assert!(!candidate.exists());
    }

    #[test]
    fn promote_rejects_missing_candidate() {
        let ws = RepairWorkspace::new(Path::new("in.mp4"), None).unwrap();
        let err = ws
            .promote(&ws.candidate("never-made.mp4"), Path::new("/tmp/out.mp4"))
            .unwrap_err();
        assert!(matches!(err, Error::Workspace(_)));
    }

    #[test]
    fn workspace_cleans_up_on_drop() {
        let dir;
        {
            let ws = RepairWorkspace::new(Path::new("in.mp4"), None).unwrap();
            dir = ws.dir().to_path_buf();
            std::fs::File::create(ws.candidate("tmp.bin")).unwrap();
        }
        assert!(!dir.exists());
    }

    #[test]
    fn custom_temp_root_is_used() {
        let root = tempfile::tempdir().unwrap();
        let ws = RepairWorkspace::new(Path::new("in.mp4"), Some(root.path())).unwrap();
        assert!(ws.dir().starts_with(root.path()));
    }
}
