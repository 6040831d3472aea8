//! Access-token credentials and their persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::codec::JsonCodec;
use crate::error::Result;

/// Token key and secret pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub token_key: String,
    pub token_secret: String,
}

impl Credentials {
    pub fn new(token_key: impl Into<String>, token_secret: impl Into<String>) -> Self {
        Self {
            token_key: token_key.into(),
            token_secret: token_secret.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token_key", &self.token_key)
            .field("token_secret", &"<redacted>")
            .finish()
    }
}

/// Persistence for credentials between runs.
pub trait CredentialStore {
    /// Load stored credentials, if any.
    fn load(&self) -> Result<Option<Credentials>>;

    /// Store credentials, replacing what was there.
    fn save(&self, credentials: &Credentials) -> Result<()>;
}

/// Credentials kept in a JSON file with `token_key` and `token_secret`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for JsonFileStore {
    fn load(&self) -> Result<Option<Credentials>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        JsonCodec::decode(&bytes).map(Some)
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        let mut bytes = JsonCodec::encode(credentials)?;
        bytes.push(b'\n');
        std::fs::write(&self.path, bytes)?;
        tracing::debug!("Saved credentials to {}", self.path.display());
        Ok(())
    }
}
