//! Configuration management for the Catalog Service
//!
//! Loads configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Which document store backs the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Process-local store, contents lost on restart
    Memory,
    /// Redis with pub/sub change notifications
    Redis,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "redis" => Ok(BackendKind::Redis),
            other => anyhow::bail!("Unknown BACKEND '{}' (expected memory or redis)", other),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server host
    pub api_host: String,

    /// API server port
    pub api_port: u16,

    /// Document store implementation
    pub backend: BackendKind,

    /// Redis connection URL (redis backend only)
    pub redis_url: String,

    /// Directory holding uploaded icons
    pub icon_dir: PathBuf,

    /// Public URL prefix under which `icon_dir` is served
    pub icon_base_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        let config = Config {
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            api_port: env::var("API_PORT")
                .unwrap_or_else(|_| "8090".to_string())
                .parse()
                .context("Invalid API_PORT")?,

            backend: env::var("BACKEND")
                .unwrap_or_else(|_| "memory".to_string())
                .parse()?,

            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),

            icon_dir: env::var("ICON_DIR")
                .unwrap_or_else(|_| "./data/icons".to_string())
                .into(),

            icon_base_url: env::var("ICON_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8090/icons".to_string()),
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.api_port == 0 {
            anyhow::bail!("API_PORT must be greater than 0");
        }

        if self.icon_base_url.trim().is_empty() {
            anyhow::bail!("ICON_BASE_URL must not be empty");
        }

        Ok(())
    }

    /// Get the API server address
    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    /// Ensure the icon directory exists
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.icon_dir).with_context(|| {
            format!(
                "Failed to create icon directory: {}",
                self.icon_dir.display()
            )
        })
    }
}
