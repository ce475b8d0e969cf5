// src/auth/token_store.rs - Session token persistence
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Stores the cloud session token as a plain file so a restart can
/// re-authenticate without bothering the user.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Previously persisted token, if any. Trailing whitespace is trimmed and
    /// an empty file counts as no token.
    pub fn load(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim().to_string();
                if token.is_empty() { None } else { Some(token) }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!("Failed to read token file '{}': {}", self.path.display(), e);
                None
            }
        }
    }

    /// Replace the stored token atomically: write to a temp file in the same
    /// directory, then rename over the old one.
    pub fn store(&self, token: &str) -> std::io::Result<()> {
        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(token.as_bytes())?;
        file.persist(&self.path).map_err(|e| e.error)?;
        tracing::debug!("Session token written to {}", self.path.display());
        Ok(())
    }
}
