//! The `examkit validate` command.

use std::path::PathBuf;

use anyhow::Result;

use examkit_core::parser::{load_assessments, validate_assessment};

pub fn execute(assessment_path: PathBuf) -> Result<()> {
    let assessments = load_assessments(&assessment_path)?;

    let mut total_warnings = 0;
    let mut total_errors = 0;

    for assessment in &assessments {
        println!(
            "Assessment {}: {} ({} questions, {}s, {} points)",
            assessment.id,
            assessment.title,
            assessment.questions.len(),
            assessment.duration_secs,
            super::points(assessment.total_points()),
        );

        for w in validate_assessment(assessment) {
            let prefix = w
                .question_id
                .map(|id| format!("  [Q{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            if w.blocking {
                println!("{prefix} ERROR: {}", w.message);
                total_errors += 1;
            } else {
                println!("{prefix} WARNING: {}", w.message);
                total_warnings += 1;
            }
        }
    }

    if total_errors == 0 && total_warnings == 0 {
        println!("All assessments valid.");
    } else {
        println!("\n{total_errors} error(s) and {total_warnings} warning(s) found.");
    }

    if total_errors > 0 {
        anyhow::bail!("{total_errors} error(s) would prevent import");
    }
    Ok(())
}
