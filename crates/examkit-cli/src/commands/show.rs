//! The `examkit show` and `examkit submissions` commands.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use examkit_core::report::SubmissionReport;

use super::{open_engine, points};

pub async fn execute(
    submission_id: u64,
    json: bool,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (_, engine) = open_engine(config_path)?;
    let review = engine.review(submission_id).await?;
    let report = SubmissionReport::from(&review);

    if let Some(path) = &output {
        report.save_json(path)?;
        eprintln!("Report saved to: {}", path.display());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Submission {} (assessment {}, student {}), submitted {}",
        report.submission_id,
        report.assessment_id,
        report.student_id,
        report.submitted_at.format("%Y-%m-%d %H:%M:%S UTC"),
    );

    let mut table = Table::new();
    table.set_header(vec!["Q", "Kind", "Answer", "Points", "Graded", "Feedback"]);
    for row in &report.rows {
        let answer = match &row.interpreted {
            Some(interpreted) => interpreted.clone(),
            None => truncate(&row.raw_answer, 40),
        };
        table.add_row(vec![
            Cell::new(row.question_id),
            Cell::new(row.kind),
            Cell::new(answer),
            Cell::new(format!("{} / {}", points(row.points_earned), points(row.points))),
            Cell::new(if row.is_graded { "yes" } else { "pending" }),
            Cell::new(row.feedback.as_deref().unwrap_or("")),
        ]);
    }
    println!("{table}");

    let agg = &report.aggregate;
    println!(
        "Total: {} / {} points ({:.1}%), {}",
        points(agg.earned),
        points(agg.possible),
        agg.percentage,
        agg.status
    );
    let pending = report.pending().count();
    if pending > 0 {
        println!("{pending} question(s) awaiting manual grading.");
    }

    Ok(())
}

pub async fn list(assessment_id: u64, config_path: Option<PathBuf>) -> Result<()> {
    let (_, engine) = open_engine(config_path)?;
    let store = engine.store();
    let assessment = store.get_assessment(assessment_id).await?;
    let submissions = store.list_submissions(assessment_id).await?;

    println!(
        "Assessment {}: {} ({} submission(s))",
        assessment.id,
        assessment.title,
        submissions.len()
    );
    if submissions.is_empty() {
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Submission", "Student", "Score", "Status", "Submitted"]);
    for submission in &submissions {
        table.add_row(vec![
            Cell::new(submission.id),
            Cell::new(submission.student_id),
            Cell::new(format!(
                "{} / {}",
                points(submission.earned),
                points(submission.possible)
            )),
            Cell::new(if submission.is_graded { "graded" } else { "pending" }),
            Cell::new(submission.submitted_at.format("%Y-%m-%d %H:%M")),
        ]);
    }
    println!("{table}");

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
