//! Credential file storage backends.
//!
//! Provides the [`CredentialStore`] trait and two implementations:
//! - [`FileCredentialStore`] - the real on-disk backing file
//! - [`MemoryCredentialStore`] - in-memory storage for testing
//!
//! The store is a pure I/O boundary: it moves text in and out of a path and
//! knows nothing about credential semantics. Path expansion of a leading `~`
//! is the caller's job ([`crate::oauth::TokenAuthority`] does it).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::oauth::OAuthError;

/// File permissions for the credentials file (Unix only): owner read/write.
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Directory permissions (Unix only): owner read/write/execute.
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

/// Trait for credential file storage backends.
///
/// All implementations must be thread-safe (`Send + Sync`). Read and write
/// failures map to [`OAuthError::FileRead`].
pub trait CredentialStore: Send + Sync {
    /// Check whether a file exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Read the full text content of `path`.
    fn read(&self, path: &Path) -> Result<String, OAuthError>;

    /// Replace the content of `path` wholesale.
    fn write(&self, path: &Path, content: &str) -> Result<(), OAuthError>;

    /// Get the name of this storage backend.
    fn name(&self) -> &str;
}

// Blanket implementation for Arc<T>
impl<T: CredentialStore + ?Sized> CredentialStore for Arc<T> {
    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }
    fn read(&self, path: &Path) -> Result<String, OAuthError> {
        (**self).read(path)
    }
    fn write(&self, path: &Path, content: &str) -> Result<(), OAuthError> {
        (**self).write(path, content)
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

// =============================================================================
// FileCredentialStore
// =============================================================================

/// On-disk credential storage.
///
/// # Security
/// - The file is written with 0600 permissions (owner read/write only) on Unix
/// - Parent directories are created with 0700 permissions
/// - Writes go to a temp file first, then rename, so a crash mid-write never
///   leaves a truncated credentials file
#[derive(Debug, Clone, Default)]
pub struct FileCredentialStore;

impl FileCredentialStore {
    /// Create a new FileCredentialStore.
    pub fn new() -> Self {
        Self
    }

    fn ensure_parent(path: &Path) -> Result<(), OAuthError> {
        let Some(parent) = path.parent() else {
            return Ok(());
        };
        if parent.as_os_str().is_empty() || parent.exists() {
            return Ok(());
        }
        std::fs::create_dir_all(parent)
            .map_err(|e| OAuthError::file_read(path, format!("Failed to create directory: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(DIR_MODE);
            std::fs::set_permissions(parent, perms).map_err(|e| {
                OAuthError::file_read(path, format!("Failed to set directory permissions: {e}"))
            })?;
        }
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read(&self, path: &Path) -> Result<String, OAuthError> {
        std::fs::read_to_string(path).map_err(|e| OAuthError::file_read(path, e.to_string()))
    }

    fn write(&self, path: &Path, content: &str) -> Result<(), OAuthError> {
        Self::ensure_parent(path)?;

        let temp_path = path.with_extension("tmp");

        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(FILE_MODE)
                .open(&temp_path)
                .map_err(|e| OAuthError::file_read(&temp_path, e.to_string()))?;
            file.write_all(content.as_bytes())
                .map_err(|e| OAuthError::file_read(&temp_path, e.to_string()))?;
            file.sync_all()
                .map_err(|e| OAuthError::file_read(&temp_path, e.to_string()))?;
        }

        #[cfg(not(unix))]
        {
            std::fs::write(&temp_path, content)
                .map_err(|e| OAuthError::file_read(&temp_path, e.to_string()))?;
        }

        if let Err(e) = std::fs::rename(&temp_path, path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(OAuthError::file_read(path, format!("Failed to rename: {e}")));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

// =============================================================================
// MemoryCredentialStore
// =============================================================================

/// In-memory credential storage.
///
/// Uses `Arc<RwLock<HashMap>>` for thread-safe access. Useful for testing.
/// The store is Clone and clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    inner: Arc<RwLock<HashMap<PathBuf, String>>>,
}

impl MemoryCredentialStore {
    /// Create a new empty MemoryCredentialStore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a MemoryCredentialStore with initial content at `path`.
    pub fn with_content(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        let store = Self::new();
        let mut guard = store.inner.write().expect("lock poisoned");
        guard.insert(path.into(), content.into());
        drop(guard);
        store
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn exists(&self, path: &Path) -> bool {
        self.inner.read().expect("lock poisoned").contains_key(path)
    }

    fn read(&self, path: &Path) -> Result<String, OAuthError> {
        let guard = self.inner.read().expect("lock poisoned");
        guard
            .get(path)
            .cloned()
            .ok_or_else(|| OAuthError::file_read(path, "No such entry"))
    }

    fn write(&self, path: &Path, content: &str) -> Result<(), OAuthError> {
        let mut guard = self.inner.write().expect("lock poisoned");
        guard.insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
