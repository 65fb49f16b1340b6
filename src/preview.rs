use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::engine::{MediaArtifact, PreviewError, PreviewHandle, PreviewStore};

/// Preview handles backed by files in a private cache directory. Releasing a
/// handle deletes its file.
pub struct TempPreviewStore {
    dir: PathBuf,
}

impl TempPreviewStore {
    /// Directory: ~/.cache/posture-check/previews/
    pub fn open() -> io::Result<Self> {
        let mut dir = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
        dir.push("posture-check");
        dir.push("previews");
        Self::in_dir(dir)
    }

    /// Use `dir`, removing previews left behind by an earlier run.
    pub fn in_dir(dir: PathBuf) -> io::Result<Self> {
        fs::create_dir_all(&dir)?;
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_file() {
                log::debug!("Removing leftover preview {}", path.display());
                let _ = fs::remove_file(&path);
            }
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn file_name_for(artifact: &MediaArtifact) -> String {
    let clean: String = artifact
        .name()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}-{clean}", artifact.id())
}

impl PreviewStore for TempPreviewStore {
    fn create(&mut self, artifact: &MediaArtifact) -> Result<PreviewHandle, PreviewError> {
        let path = self.dir.join(file_name_for(artifact));
        fs::write(&path, artifact.bytes())?;
        log::debug!("Preview for {} at {}", artifact.id(), path.display());
        Ok(PreviewHandle {
            artifact: artifact.id(),
            location: path.to_string_lossy().into_owned(),
            mime: artifact.mime().to_string(),
        })
    }

    fn release(&mut self, handle: PreviewHandle) {
        if let Err(e) = fs::remove_file(&handle.location) {
            log::warn!("Failed to remove preview {}: {e}", handle.location);
        }
    }
}
