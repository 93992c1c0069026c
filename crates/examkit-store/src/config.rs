//! Store configuration and factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use examkit_core::traits::SubmissionStore;

use crate::json::JsonFileStore;
use crate::memory::MemoryStore;

/// Which backend holds assessments and submissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Nothing survives the process. Useful for dry runs.
    Memory,
    Json {
        #[serde(default = "default_json_path")]
        path: PathBuf,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Json {
            path: default_json_path(),
        }
    }
}

fn default_json_path() -> PathBuf {
    PathBuf::from("./examkit-data/store.json")
}

/// Top-level examkit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamkitConfig {
    #[serde(default)]
    pub store: StoreConfig,
    /// Countdown tick period in milliseconds. One tick is one second of exam
    /// time; shorten it only for demos.
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
    /// Directory `examkit import` reads when no path is given.
    #[serde(default = "default_assessments_dir")]
    pub assessments_dir: PathBuf,
}

fn default_tick_millis() -> u64 {
    1000
}
fn default_assessments_dir() -> PathBuf {
    PathBuf::from("./assessments")
}

impl Default for ExamkitConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            tick_millis: default_tick_millis(),
            assessments_dir: default_assessments_dir(),
        }
    }
}

impl ExamkitConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_millis.max(1))
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_path(path: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy()))
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `examkit.toml` in the current directory
/// 2. `~/.config/examkit/config.toml`
///
/// `EXAMKIT_DATA_DIR` overrides the store location with
/// `$EXAMKIT_DATA_DIR/store.json`.
pub fn load_config() -> Result<ExamkitConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ExamkitConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("examkit.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ExamkitConfig::default(),
    };

    if let Ok(dir) = std::env::var("EXAMKIT_DATA_DIR") {
        config.store = StoreConfig::Json {
            path: PathBuf::from(dir).join("store.json"),
        };
    }

    config.store = match config.store {
        StoreConfig::Json { path } => StoreConfig::Json {
            path: resolve_path(&path),
        },
        StoreConfig::Memory => StoreConfig::Memory,
    };
    config.assessments_dir = resolve_path(&config.assessments_dir);

    Ok(config)
}

fn parse_config(content: &str) -> Result<ExamkitConfig> {
    let config: ExamkitConfig = toml::from_str(content)?;
    if config.tick_millis == 0 {
        anyhow::bail!("tick_millis must be at least 1");
    }
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("examkit"))
}

/// Create a store instance from its configuration.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn SubmissionStore>> {
    match config {
        StoreConfig::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreConfig::Json { path } => {
            let store = JsonFileStore::open(path)
                .with_context(|| format!("failed to open store: {}", path.display()))?;
            Ok(Arc::new(store))
        }
    }
}

/// Default contents written by `examkit init`.
pub fn default_config_toml() -> &'static str {
    r#"# examkit configuration

# Countdown tick period in milliseconds (1000 = real time).
tick_millis = 1000

# Where `examkit import` looks for assessment files.
assessments_dir = "./assessments"

[store]
type = "json"
path = "./examkit-data/store.json"
"#
}
