//! Runtime configuration loaded from `config.json` with environment overrides

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "config.json";
const CONFIG_PATH_ENV: &str = "JUKEBOX_CONFIG";
const CLIENT_ID_ENV: &str = "RSPOTIFY_CLIENT_ID";
const CLIENT_SECRET_ENV: &str = "RSPOTIFY_CLIENT_SECRET";

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub yt_dlp_path: PathBuf,
    pub player_path: PathBuf,
    pub channel: String,
    pub resolve_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub search_results: u32,
    pub log_dir: PathBuf,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spotify_client_id: None,
            spotify_client_secret: None,
            yt_dlp_path: PathBuf::from("yt-dlp"),
            player_path: PathBuf::from("mpv"),
            channel: crate::audio::DEFAULT_CHANNEL.to_string(),
            resolve_timeout_secs: 15,
            connect_timeout_secs: 10,
            search_results: 5,
            log_dir: PathBuf::from(".logs"),
            log_filter: crate::logging::DEFAULT_FILTER.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Config {
    /// Read the config file named by `JUKEBOX_CONFIG` (or `config.json`),
    /// falling back to defaults when it does not exist.
    ///
    /// Runs before logging is set up, since the log location is configured here.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup(CLIENT_ID_ENV) {
            self.spotify_client_id = Some(id);
        }
        if let Some(secret) = lookup(CLIENT_SECRET_ENV) {
            self.spotify_client_secret = Some(secret);
        }
    }

    /// Catalog credentials, if both halves are present and non-empty
    pub fn catalog_credentials(&self) -> Option<CatalogCredentials> {
        match (&self.spotify_client_id, &self.spotify_client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Some(CatalogCredentials {
                    client_id: id.clone(),
                    client_secret: secret.clone(),
                })
            }
            _ => None,
        }
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
