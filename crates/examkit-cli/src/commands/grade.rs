//! The `examkit grade` command.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;

use examkit_core::grading::ManualGrade;

use super::{open_engine, points};

pub async fn execute(
    submission_id: u64,
    question_id: u64,
    score: f64,
    feedback: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (_, engine) = open_engine(config_path)?;

    let mut grade = ManualGrade::new(score);
    if let Some(feedback) = feedback {
        grade = grade.with_feedback(feedback);
    }
    let grades = HashMap::from([(question_id, grade)]);

    let summary = engine.finalize(submission_id, &grades).await?;
    if summary.clamped.contains(&question_id) {
        println!("Note: score {score} was clamped to the question's range.");
    }

    let agg = &summary.aggregate;
    println!(
        "Submission {}: {} / {} points ({:.1}%), {}",
        summary.submission_id,
        points(agg.earned),
        points(agg.possible),
        agg.percentage,
        agg.status
    );

    Ok(())
}
