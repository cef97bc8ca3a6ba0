use anyhow::{anyhow, Result};
use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

pub const QUALIFIER: &str = "com";
pub const ORGANIZATION: &str = "MediaMenu";
pub const APPLICATION: &str = "media-menu";

/// Contents of `config.toml`. Every key is optional in the file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub download_directory: String,
    pub host: String,
    pub port: u16,
    /// Binary used for both extraction and downloading.
    pub ytdlp_path: String,
    /// Passed to yt-dlp as `--ffmpeg-location` when FFmpeg is not on PATH.
    pub ffmpeg_location: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let default_dir = UserDirs::new()
            .and_then(|dirs| dirs.download_dir().map(|p| p.to_string_lossy().to_string()))
            .unwrap_or_else(|| "downloads".to_string());

        Config {
            download_directory: default_dir,
            host: "127.0.0.1".to_string(),
            port: 5000,
            ytdlp_path: "yt-dlp".to_string(),
            ffmpeg_location: None,
        }
    }
}

impl Config {
    /// Applies `HOST` / `PORT` from the environment on top of the file values.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(host) = std::env::var("HOST") {
            self.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            self.port = port
                .parse()
                .map_err(|e| anyhow!("Invalid PORT value '{}': {}", port, e))?;
        }
        Ok(self)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
        .ok_or_else(|| anyhow!("Could not find a valid home directory to store config"))
}

/// Cross-platform path to the configuration file, creating its directory if needed.
pub async fn config_path() -> Result<PathBuf> {
    let project_dirs = project_dirs()?;
    let config_dir = project_dirs.config_dir();
    fs::create_dir_all(config_dir).await?;
    Ok(config_dir.join("config.toml"))
}

/// Loads the configuration file, writing a default one if it doesn't exist yet.
pub async fn load_config() -> Result<Config> {
    let config_path = config_path().await?;

    if !config_path.exists() {
        tracing::info!(
            "No config file found. Creating a default one at: {}",
            config_path.display()
        );
        let default_config = Config::default();
        save_config(&default_config).await?;
        return Ok(default_config);
    }

    let config_content = fs::read_to_string(&config_path).await?;
    parse_config(&config_content)
        .map_err(|e| anyhow!("Failed to parse config file at {}: {}", config_path.display(), e))
}

pub fn parse_config(content: &str) -> Result<Config> {
    Ok(toml::from_str(content)?)
}

pub async fn save_config(config: &Config) -> Result<()> {
    let config_path = config_path().await?;
    let toml_string = toml::to_string_pretty(config)?;
    fs::write(config_path, toml_string).await?;
    Ok(())
}
