//! Configuration for the quickcap server and CLI companion

use anyhow::{Context, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub pomodoro: PomodoroConfig,
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS. Empty means any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PomodoroConfig {
    /// Length of one focus session in minutes
    #[serde(default = "default_focus_minutes")]
    pub focus_minutes: u32,

    /// Where the terminal focus session persists its state
    #[serde(default)]
    pub state_path: Option<PathBuf>,
}

/// An API token and the identity it grants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Human-readable name for the token
    pub name: String,
    /// Argon2 hash of the token
    pub token_hash: String,
    /// Owner of everything created with this token
    pub user_id: i64,
    #[serde(default)]
    pub admin: bool,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_db_path() -> PathBuf {
    PathBuf::from("quickcap.sqlite")
}

fn default_focus_minutes() -> u32 {
    25
}

impl Default for PomodoroConfig {
    fn default() -> Self {
        Self {
            focus_minutes: default_focus_minutes(),
            state_path: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind: default_bind(),
                port: default_port(),
                allowed_origins: Vec::new(),
            },
            database: DatabaseConfig {
                path: default_db_path(),
            },
            pomodoro: PomodoroConfig::default(),
            tokens: Vec::new(),
        }
    }
}

impl Config {
    /// Default config path
    pub fn default_path() -> Result<PathBuf> {
        // Check environment variable first
        if let Ok(env_path) = std::env::var("QUICKCAP_CONFIG") {
            return Ok(PathBuf::from(env_path));
        }

        let local = PathBuf::from("config.toml");
        if local.exists() {
            return Ok(local);
        }

        // Docker default
        let data_config = PathBuf::from("/data/config.toml");
        if data_config.exists() {
            return Ok(data_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("quickcap");

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from default path
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save config to specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let with_comments = format!(
            "# quickcap configuration\n\n\
             {}\n\n\
             # Add tokens with: quickcap token --name <device-name>\n",
            content
        );

        std::fs::write(path, with_comments).context("Failed to write config file")?;

        Ok(())
    }

    /// Find the token entry matching a presented bearer token
    pub fn authenticate(&self, token: &str) -> Option<&TokenConfig> {
        let argon2 = Argon2::default();

        self.tokens.iter().find(|t| {
            PasswordHash::new(&t.token_hash)
                .map(|parsed| argon2.verify_password(token.as_bytes(), &parsed).is_ok())
                .unwrap_or(false)
        })
    }

    /// Token entry by its label, or the first one when no label is given
    pub fn token_named(&self, name: Option<&str>) -> Option<&TokenConfig> {
        match name {
            Some(name) => self.tokens.iter().find(|t| t.name == name),
            None => self.tokens.first(),
        }
    }

    /// Location of the persisted focus session
    pub fn focus_state_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.pomodoro.state_path {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_dir()
            .context("Could not determine data directory")?
            .join("quickcap");
        Ok(data_dir.join("focus.json"))
    }
}

/// Hash a token using argon2
pub fn hash_token(token: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(token.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash token: {}", e))?;
    Ok(hash.to_string())
}
