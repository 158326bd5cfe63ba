//! Application configuration: built-in defaults, a TOML file, then environment.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::session::MAX_LEVELS;

/// Directory under the user config dir holding Gu3ss files.
pub const CONFIG_DIR: &str = "gu3ss";
/// Prefix for environment overrides, e.g. `GU3SS__ROUTING__API_KEY`.
pub const ENV_PREFIX: &str = "GU3SS";

const DEFAULT_CONFIG: &str = r#"# Gu3ss configuration

# Optional JSON catalog replacing the built-in Poprad points.
# catalog_path = "/path/to/catalog.json"

[routing]
base_url = "https://api.openrouteservice.org"
profile = "driving-car"
# api_key = "your-openrouteservice-token"
timeout_secs = 20
max_retries = 5
retry_backoff_ms = 1000
refine_retries = 0

[game]
level_count = 5
"#;

/// Routing provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Provider base URL.
    pub base_url: String,
    /// Directions profile segment of the URL.
    pub profile: String,
    /// Provider API key.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Retries for the scored route of each round.
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub retry_backoff_ms: u64,
    /// Retries for the endpoint refinement request.
    pub refine_retries: u32,
}

impl RoutingConfig {
    /// Delay between failed attempts.
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openrouteservice.org".to_string(),
            profile: "driving-car".to_string(),
            api_key: None,
            timeout_secs: 20,
            max_retries: 5,
            retry_backoff_ms: 1000,
            refine_retries: 0,
        }
    }
}

/// Game rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Rounds per game.
    pub level_count: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self { level_count: 5 }
    }
}

/// Fully resolved application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Routing provider section.
    pub routing: RoutingConfig,
    /// Game rules section.
    pub game: GameConfig,
    /// Optional catalog file; the Poprad catalog is used when absent.
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load from the default config file and the process environment.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path(), Environment::with_prefix(ENV_PREFIX))
    }

    /// Load from `path` (optional on disk) layered under `env`.
    pub fn load_from(path: impl AsRef<Path>, env: Environment) -> Result<Self> {
        let path = path.as_ref();
        let settings = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(env.separator("__").try_parsing(true))
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        let config: Self = settings
            .try_deserialize()
            .context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(1..=MAX_LEVELS).contains(&self.game.level_count) {
            bail!(
                "game.level_count must be between 1 and {MAX_LEVELS}, got {}",
                self.game.level_count
            );
        }
        if self.routing.timeout_secs == 0 {
            bail!("routing.timeout_secs must be positive");
        }
        Ok(())
    }
}

/// Directory holding the config file and the score store.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
}

/// Location of `config.toml`.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Write the commented default config file on first run.
pub fn ensure_default_config() -> Result<()> {
    write_default_config(config_path())
}

fn write_default_config(path: PathBuf) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "wrote default configuration");
    Ok(())
}
