//! Local file storage for generated images and moodboard uploads
//!
//! Paths stored in the database are relative to the root folder and always
//! use `/` separators. Resolution refuses anything that could escape the
//! root (absolute paths, `..` components).

use std::path::{Component, Path, PathBuf};
use tracing::debug;
use utr_common::{Error, Result};

#[derive(Debug, Clone)]
pub struct StudyStorage {
    root: PathBuf,
}

impl StudyStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `images/session_<sid>/prompt_<pid>.png`
    pub fn generated_image_path(session_id: i64, prompt_id: i64) -> String {
        format!("images/session_{}/prompt_{}.png", session_id, prompt_id)
    }

    /// `moodboard/user_<uid>/<file_name>`
    pub fn moodboard_path(user_id: i64, file_name: &str) -> String {
        format!("moodboard/user_{}/{}", user_id, file_name)
    }

    /// Absolute path for a stored relative path
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let rel = Path::new(relative);
        let safe = !relative.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe {
            return Err(Error::InvalidInput(format!("Unsafe storage path: {}", relative)));
        }
        Ok(self.root.join(rel))
    }

    pub async fn write(&self, relative: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.resolve(relative)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), size = bytes.len(), "Stored file");
        Ok(path)
    }

    /// File contents, or `None` when the file is gone
    pub async fn read(&self, relative: &str) -> Result<Option<Vec<u8>>> {
        let path = self.resolve(relative)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a stored file. Returns whether a file was actually deleted.
    pub async fn remove(&self, relative: &str) -> Result<bool> {
        let path = self.resolve(relative)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
