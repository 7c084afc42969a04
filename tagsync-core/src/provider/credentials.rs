//! Provider API credentials from the environment or a config file.

use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

pub const API_KEY_VAR: &str = "BOORU_API_KEY";
pub const USER_ID_VAR: &str = "BOORU_USER_ID";
pub const CONFIG_FILE_NAME: &str = "booru_config.json";

#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub api_key: String,
    pub user_id: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

#[derive(Deserialize)]
struct CredentialsFile {
    api_key: Option<String>,
    user_id: Option<String>,
}

impl Credentials {
    fn from_parts(api_key: Option<String>, user_id: Option<String>) -> Option<Self> {
        match (api_key, user_id) {
            (Some(api_key), Some(user_id)) if !api_key.is_empty() && !user_id.is_empty() => {
                Some(Self { api_key, user_id })
            }
            _ => None,
        }
    }

    /// Read `BOORU_API_KEY` and `BOORU_USER_ID` through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        Self::from_parts(lookup(API_KEY_VAR), lookup(USER_ID_VAR))
    }

    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read a `{"api_key": ..., "user_id": ...}` file.
    ///
    /// A missing file is `Ok(None)`; so is a file lacking either field.
    pub fn from_file(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let unreadable = |message: String| ConfigError::Unreadable {
            path: path.display().to_string(),
            message,
        };
        let contents = std::fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
        let file: CredentialsFile =
            serde_json::from_str(&contents).map_err(|e| unreadable(e.to_string()))?;
        Ok(Self::from_parts(file.api_key, file.user_id))
    }

    /// Config file locations in search order: the working directory, then
    /// the user config directory.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(cwd) = env::current_dir() {
            paths.push(cwd.join(CONFIG_FILE_NAME));
        }
        if let Some(config) = dirs::config_dir() {
            paths.push(config.join("tagsync").join(CONFIG_FILE_NAME));
        }
        paths
    }

    /// Environment first, then the first config file that holds both fields.
    /// Unreadable files are logged and skipped.
    pub fn load() -> Option<Self> {
        if let Some(creds) = Self::from_env() {
            tracing::info!(user_id = %creds.user_id, "loaded provider credentials from environment");
            return Some(creds);
        }

        for path in Self::search_paths() {
            match Self::from_file(&path) {
                Ok(Some(creds)) => {
                    tracing::info!(path = %path.display(), user_id = %creds.user_id, "loaded provider credentials");
                    return Some(creds);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "ignoring credentials file"),
            }
        }

        tracing::warn!(
            "no provider credentials found; set {API_KEY_VAR} and {USER_ID_VAR} or create {CONFIG_FILE_NAME}"
        );
        None
    }
}
