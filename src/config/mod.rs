//! Configuration and seeded collaborator data

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{Account, Role};

/// Env var pointing at an alternate config file.
pub const CONFIG_ENV: &str = "PPID_PORTAL_CONFIG";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub rate_limit: RateLimitConfig,
    pub chat: ChatConfig,
    pub directory: DirectoryConfig,
    pub storage: StorageConfig,
    pub file_store: FileStoreConfig,
    /// Accounts backing the in-process account directory
    pub accounts: Vec<Account>,
    /// Bearer credentials accepted by the token authenticator
    pub credentials: Vec<Credential>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Quotas for the polled endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub directory_max_requests: u32,
    pub directory_window_secs: u64,
    pub unread_max_requests: u32,
    pub unread_window_secs: u64,
    /// How often expired windows are purged
    pub gc_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            directory_max_requests: 30,
            directory_window_secs: 60,
            // Background unread polling runs every 30s; leave room for a few tabs.
            unread_max_requests: 10,
            unread_window_secs: 60,
            gc_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Days a requester has to upload usage evidence after completion
    pub evidence_window_days: i64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            evidence_window_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Store snapshot file; defaults to `store.json` in the data dir
    pub snapshot_path: Option<PathBuf>,
    pub flush_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            flush_interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStoreConfig {
    /// Upload endpoint; in-memory store is used when unset
    pub base_url: Option<String>,
    /// Bearer token for the upload endpoint
    pub api_token: Option<String>,
    pub timeout_secs: u64,
    pub max_upload_bytes: u64,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_token: None,
            timeout_secs: 30,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// A bearer credential, stored as a SHA-256 hex digest of the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub token_sha256: String,
    pub subject_id: String,
    pub role: Role,
    pub display_name: String,
}

impl Config {
    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("id", "ppid-portal", "ppid-portal")
            .context("Could not determine config directory")
    }

    /// Get config file path, honoring `PPID_PORTAL_CONFIG`
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from an explicit path; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Add `credential`, replacing any entry for the same subject.
    /// Returns true when an entry was replaced.
    pub fn upsert_credential(&mut self, credential: Credential) -> bool {
        let before = self.credentials.len();
        self.credentials
            .retain(|c| c.subject_id != credential.subject_id);
        let replaced = self.credentials.len() != before;
        self.credentials.push(credential);
        replaced
    }

    /// Save configuration to disk
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;

        // Config holds credential digests and the file store token
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    /// Resolved snapshot path
    pub fn snapshot_path(&self) -> Result<PathBuf> {
        match self.storage.snapshot_path {
            Some(ref path) => Ok(path.clone()),
            None => Ok(Self::project_dirs()?.data_dir().join("store.json")),
        }
    }
}
