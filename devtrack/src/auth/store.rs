//! Persistence of the session token between invocations.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use devtrack_proto::dto::UserInfo;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::AuthError;

/// What a successful login leaves behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Bearer token for the resource endpoints.
    pub token: String,
    /// Profile returned with the token, when the server sent one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
}

/// Storage for the current [`Credentials`].
pub trait TokenStore: Send + Sync {
    /// Returns the stored credentials, if any.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if the backing storage cannot be read.
    fn load(&self) -> Result<Option<Credentials>, AuthError>;

    /// Replaces the stored credentials.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if the backing storage cannot be written.
    fn save(&self, credentials: &Credentials) -> Result<(), AuthError>;

    /// Forgets the stored credentials. Clearing an empty store succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if the backing storage cannot be modified.
    fn clear(&self) -> Result<(), AuthError>;
}

/// [`TokenStore`] backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Creates a store at `path`. Nothing is touched until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location: `<data dir>/devtrack/token`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("devtrack").join("token"))
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn storage_error(&self, source: io::Error) -> AuthError {
        AuthError::Storage {
            path: self.path.clone(),
            source,
        }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<Credentials>, AuthError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.storage_error(e)),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| AuthError::CorruptCredentials {
                path: self.path.clone(),
                source,
            })
    }

    fn save(&self, credentials: &Credentials) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.storage_error(e))?;
        }
        let json = serde_json::to_string(credentials).map_err(|source| {
            AuthError::CorruptCredentials {
                path: self.path.clone(),
                source,
            }
        })?;
        write_private(&self.path, json.as_bytes()).map_err(|e| self.storage_error(e))?;
        tracing::debug!(path = %self.path.display(), "credentials saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.storage_error(e)),
        }
    }
}

/// Writes `contents` to `path`, readable and writable by the owner only.
fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    // `mode` only applies on creation; tighten a file left by an older run.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(contents)
}

/// [`TokenStore`] that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    credentials: Mutex<Option<Credentials>>,
}

impl MemoryTokenStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<Credentials>, AuthError> {
        Ok(self.credentials.lock().clone())
    }

    fn save(&self, credentials: &Credentials) -> Result<(), AuthError> {
        *self.credentials.lock() = Some(credentials.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        *self.credentials.lock() = None;
        Ok(())
    }
}
