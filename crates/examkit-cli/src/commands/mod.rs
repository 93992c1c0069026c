pub mod grade;
pub mod import;
pub mod init;
pub mod show;
pub mod take;
pub mod validate;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use examkit_core::engine::GradingEngine;
use examkit_store::{create_store, load_config_from, ExamkitConfig};

/// Load config and open the configured store behind a grading engine.
pub(crate) fn open_engine(config_path: Option<PathBuf>) -> Result<(ExamkitConfig, GradingEngine)> {
    let config = load_config_from(config_path.as_deref())?;
    let store = create_store(&config.store)?;
    tracing::debug!(store = store.name(), "store opened");
    Ok((config, GradingEngine::new(store)))
}

/// Format a point value without trailing zeros noise.
pub(crate) fn points(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}
