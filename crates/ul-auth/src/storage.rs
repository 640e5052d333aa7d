//! Credential storage for persisting logins between invocations.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};
use crate::jwt::Environment;

/// Trait for credential storage implementations.
pub trait CredentialStore: Send + Sync {
    /// Save a credential, replacing any previous one.
    fn save(&self, credential: &StoredCredential) -> Result<()>;

    /// Load the saved credential, if any.
    fn load(&self) -> Result<Option<StoredCredential>>;

    /// Delete the saved credential.
    fn delete(&self) -> Result<()>;
}

/// A cached login: who logged in, where, and the issued bearer token.
///
/// Private key material never appears here.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub username: String,
    pub consumer_id: String,
    pub environment: Environment,
    pub instance_url: String,
    pub token: String,
    /// Seconds.
    #[serde(default = "default_client_timeout")]
    pub client_timeout: u64,
    /// Seconds.
    #[serde(default = "default_download_timeout")]
    pub download_timeout: u64,
    /// Seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
}

fn default_client_timeout() -> u64 {
    10
}

fn default_download_timeout() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    60
}

impl Default for StoredCredential {
    fn default() -> Self {
        Self {
            username: String::new(),
            consumer_id: String::new(),
            environment: Environment::Production,
            instance_url: String::new(),
            token: String::new(),
            client_timeout: default_client_timeout(),
            download_timeout: default_download_timeout(),
            connect_timeout: default_connect_timeout(),
            issued_at: None,
        }
    }
}

impl std::fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredential")
            .field("username", &self.username)
            .field("consumer_id", &self.consumer_id)
            .field("environment", &self.environment)
            .field("instance_url", &self.instance_url)
            .field("token", &"[REDACTED]")
            .field("client_timeout", &self.client_timeout)
            .field("download_timeout", &self.download_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Login parameters read from a JSON credential file.
#[derive(Clone, Deserialize)]
pub struct LoginProfile {
    pub username: String,
    pub consumer_id: String,
    pub environment: Environment,
    /// Inline PEM key; takes precedence over `--private-key` and the
    /// environment variable when present.
    #[serde(default)]
    pub private_key: Option<String>,
}

impl std::fmt::Debug for LoginProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginProfile")
            .field("username", &self.username)
            .field("consumer_id", &self.consumer_id)
            .field("environment", &self.environment)
            .field("private_key", &self.private_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl LoginProfile {
    /// Read a profile from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::with_source(
                ErrorKind::InvalidCredentials(format!(
                    "could not read credential file {}",
                    path.display()
                )),
                e,
            )
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// File-based credential storage.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Create a store at the default path, `~/.ultra/credentials.json`.
    pub fn new() -> Result<Self> {
        Ok(Self {
            path: default_credential_path()?,
        })
    }

    /// Create a store backed by a custom file.
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn save(&self, credential: &StoredCredential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(credential)?;
        std::fs::write(&self.path, json)?;

        // Set restrictive permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.path, perms)?;
        }

        Ok(())
    }

    fn load(&self) -> Result<Option<StoredCredential>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let json = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn delete(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// Get the default credential file path.
pub fn default_credential_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| {
        Error::new(ErrorKind::Config("Could not find home directory".to_string()))
    })?;

    Ok(home.join(".ultra").join("credentials.json"))
}
