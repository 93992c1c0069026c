//! Submission reports with JSON persistence.
//!
//! A report is the read-only view of one graded (or partially graded)
//! submission: per-question rows plus the recomputed aggregate.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::SubmissionReview;
use crate::grading::{aggregate, Aggregate};
use crate::model::{
    AssessmentId, Question, QuestionId, QuestionKind, StudentId, Submission, SubmissionId,
};
use crate::normalize::{option_letter, resolve_positions};

/// A complete submission report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionReport {
    pub submission_id: SubmissionId,
    pub assessment_id: AssessmentId,
    pub student_id: StudentId,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub graded_at: Option<DateTime<Utc>>,
    pub rows: Vec<QuestionRow>,
    pub aggregate: Aggregate,
}

/// One question's line in a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRow {
    pub question_id: QuestionId,
    pub text: String,
    pub kind: QuestionKind,
    pub raw_answer: String,
    /// The answer resolved to option labels, e.g. "B (London)".
    #[serde(default)]
    pub interpreted: Option<String>,
    pub points_earned: f64,
    pub points: f64,
    pub is_graded: bool,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl SubmissionReport {
    /// Build a report from question definitions and a stored submission.
    pub fn build(questions: &[Question], submission: &Submission) -> Self {
        let rows = questions
            .iter()
            .map(|q| {
                let answer = submission.answer(q.id);
                let raw_answer = answer.map(|a| a.raw_answer.clone()).unwrap_or_default();
                QuestionRow {
                    question_id: q.id,
                    text: q.text.clone(),
                    kind: q.kind,
                    interpreted: interpret(q, &raw_answer),
                    raw_answer,
                    points_earned: answer.map(|a| a.points_earned).unwrap_or(0.0),
                    points: q.points,
                    is_graded: answer.is_some_and(|a| a.is_graded),
                    feedback: answer.and_then(|a| a.feedback.clone()),
                }
            })
            .collect();

        Self {
            submission_id: submission.id,
            assessment_id: submission.assessment_id,
            student_id: submission.student_id,
            submitted_at: submission.submitted_at,
            graded_at: submission.graded_at,
            rows,
            aggregate: aggregate(questions, &submission.answers),
        }
    }

    /// Rows still waiting for an instructor.
    pub fn pending(&self) -> impl Iterator<Item = &QuestionRow> {
        self.rows.iter().filter(|r| !r.is_graded)
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }
}

impl From<&SubmissionReview> for SubmissionReport {
    fn from(review: &SubmissionReview) -> Self {
        SubmissionReport::build(&review.questions, &review.submission)
    }
}

fn interpret(question: &Question, raw: &str) -> Option<String> {
    if question.kind != QuestionKind::MultipleChoice || raw.trim().is_empty() {
        return None;
    }
    let labels: Vec<String> = resolve_positions(raw, &question.options)
        .into_iter()
        .map(|i| match option_letter(i) {
            Some(letter) => format!("{letter} ({})", question.options[i]),
            None => question.options[i].clone(),
        })
        .collect();
    if labels.is_empty() {
        None
    } else {
        Some(labels.join(" or "))
    }
}
