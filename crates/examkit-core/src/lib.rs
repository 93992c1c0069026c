//! examkit-core — Timed exam delivery and hybrid grading.
//!
//! This crate defines the assessment data model, the per-question countdown
//! state machine, answer-token normalization, and the grading engine that
//! combines auto-graded multiple-choice items with manually graded free-text
//! items. Persistence is reached only through the [`traits::SubmissionStore`]
//! trait.

pub mod allocator;
pub mod driver;
pub mod engine;
pub mod error;
pub mod grading;
pub mod model;
pub mod normalize;
pub mod parser;
pub mod report;
pub mod session;
pub mod traits;

#[cfg(test)]
mod testing;
