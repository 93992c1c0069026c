//! The `examkit import` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use examkit_core::engine::GradingEngine;
use examkit_core::error::StoreError;
use examkit_core::parser::{load_assessments, validate_assessment};
use examkit_core::traits::SubmissionStore;
use examkit_store::{create_store, load_config_from, JsonFileStore, StoreConfig};

pub async fn execute(
    assessment_path: Option<PathBuf>,
    force: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let path = assessment_path.unwrap_or_else(|| config.assessments_dir.clone());
    let assessments = load_assessments(&path)?;
    if assessments.is_empty() {
        anyhow::bail!("no assessments found in {}", path.display());
    }

    // Replacing a locked assessment bypasses the store contract, so it needs
    // the concrete JSON store.
    let json_store = match (&config.store, force) {
        (StoreConfig::Json { path }, true) => Some(Arc::new(JsonFileStore::open(path)?)),
        (StoreConfig::Memory, true) => {
            anyhow::bail!("--force needs a persistent store; the memory store has nothing to replace")
        }
        (_, false) => None,
    };
    let store: Arc<dyn SubmissionStore> = match &json_store {
        Some(store) => Arc::clone(store) as Arc<dyn SubmissionStore>,
        None => create_store(&config.store)?,
    };
    let engine = GradingEngine::new(Arc::clone(&store));

    let mut imported = 0;
    for assessment in &assessments {
        let warnings = validate_assessment(assessment);
        for w in &warnings {
            let prefix = w
                .question_id
                .map(|id| format!("[Q{id}] "))
                .unwrap_or_default();
            let label = if w.blocking { "ERROR" } else { "WARNING" };
            eprintln!("  {}: {prefix}{label}: {}", assessment.title, w.message);
        }
        if warnings.iter().any(|w| w.blocking) {
            println!(
                "Skipped assessment {}: {} (fix the errors above first)",
                assessment.id, assessment.title
            );
            continue;
        }

        match store.put_assessment(assessment).await {
            Ok(()) => {
                println!("Imported assessment {}: {}", assessment.id, assessment.title);
                imported += 1;
            }
            Err(StoreError::AssessmentLocked(id)) => match &json_store {
                Some(json) => match json.replace_assessment(assessment).await {
                    Ok(()) => {
                        let regraded = engine.regrade_assessment(id).await?;
                        println!(
                            "Replaced assessment {id}: {} and regraded {} submission(s)",
                            assessment.title,
                            regraded.len()
                        );
                        imported += 1;
                    }
                    Err(e @ StoreError::DefinitionChanged { .. }) => {
                        println!("Skipped assessment {id}: {e}");
                    }
                    Err(e) => return Err(e.into()),
                },
                None => println!(
                    "Skipped assessment {id}: already has submissions (use --force to replace and regrade)"
                ),
            },
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(imported, total = assessments.len(), store = store.name(), "import finished");
    Ok(())
}
