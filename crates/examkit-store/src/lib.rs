//! examkit-store — Submission store backends.
//!
//! Implements the `SubmissionStore` trait for an in-process memory store and
//! a JSON file store, and loads the examkit configuration that selects
//! between them.

pub mod config;
pub mod document;
pub mod json;
pub mod memory;

pub use config::{
    create_store, default_config_toml, load_config, load_config_from, ExamkitConfig, StoreConfig,
};
pub use examkit_core::error::StoreError;
pub use json::JsonFileStore;
pub use memory::MemoryStore;
