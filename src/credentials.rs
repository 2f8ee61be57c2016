use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// Fixed file names in the project root, matching what Google Cloud Console
// hands out and what earlier runs of the tool left behind.
pub const CLIENT_SECRET_FILE: &str = "credentials.json";
pub const TOKEN_CACHE_FILE: &str = "token.json";

/// OAuth2 client descriptor loaded once at startup and owned by the
/// authenticator for the process lifetime.
#[derive(Debug, Clone)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
}

// credentials.json as downloaded from Google: the OAuth client lives under
// either an "installed" or a "web" section. The OpenAI key may ride along at
// the top level or under an "openai" section.
#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<SecretSection>,
    web: Option<SecretSection>,
    openai_api_key: Option<String>,
    openai: Option<OpenAiSection>,
}

#[derive(Deserialize)]
struct SecretSection {
    client_id: String,
    client_secret: String,
    auth_uri: String,
    token_uri: String,
}

#[derive(Deserialize)]
struct OpenAiSection {
    api_key: Option<String>,
}

fn read_secret_file(path: &Path) -> Result<ClientSecretFile, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::MissingClientSecret(path.to_path_buf()));
    }
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_client_secret(path: &Path) -> Result<ClientSecret, ConfigError> {
    let file = read_secret_file(path)?;
    let section = file.installed.or(file.web).ok_or_else(|| {
        ConfigError::Malformed {
            path: path.to_path_buf(),
            source: serde::de::Error::custom("missing `installed` or `web` section"),
        }
    })?;
    Ok(ClientSecret {
        client_id: section.client_id,
        client_secret: section.client_secret,
        auth_uri: section.auth_uri,
        token_uri: section.token_uri,
    })
}

/// OPENAI_API_KEY from the environment wins; otherwise fall back to the
/// credential file. Only the summarize action needs this.
pub fn load_openai_api_key(path: &Path) -> Result<String, ConfigError> {
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        if !key.trim().is_empty() {
            return Ok(key);
        }
    }

    if path.exists() {
        let file = read_secret_file(path)?;
        let key = file
            .openai_api_key
            .or(file.openai.and_then(|o| o.api_key));
        if let Some(key) = key {
            return Ok(key);
        }
    }

    Err(ConfigError::MissingOpenAiKey(path.to_path_buf()))
}

/// Cached OAuth token persisted between runs. Overwritten wholesale whenever
/// a new token is obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

// Injected persistence seam so the authenticator state machine can be tested
// with an in-memory store.
#[cfg_attr(test, mockall::automock)]
pub trait TokenStore: Send + Sync {
    /// Absent cache file is `None`, not an error.
    fn load(&self) -> Result<Option<CachedToken>, ConfigError>;
    fn save(&self, token: &CachedToken) -> Result<(), ConfigError>;
}

/// Production store: a plain JSON file next to the binary, replaced
/// atomically (write-temp-then-rename) so an interrupted run never leaves a
/// truncated cache behind.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<CachedToken>, ConfigError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        let token = serde_json::from_str(&raw).map_err(|source| ConfigError::Malformed {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(token))
    }

    fn save(&self, token: &CachedToken) -> Result<(), ConfigError> {
        let raw = serde_json::to_string_pretty(token).map_err(|source| {
            ConfigError::Malformed {
                path: self.path.clone(),
                source,
            }
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).map_err(|source| ConfigError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }
}
