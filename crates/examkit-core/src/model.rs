//! Core data model types for examkit.
//!
//! Assessments and their questions are authored by instructors; submissions
//! record one student's attempt together with its grading state.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type AssessmentId = u64;
pub type QuestionId = u64;
pub type StudentId = u64;
pub type SubmissionId = u64;

/// Raw answers captured during a session, keyed by question id.
pub type CapturedAnswers = BTreeMap<QuestionId, String>;

/// The kind of a question, which decides how it is graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    FreeText,
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionKind::MultipleChoice => write!(f, "multiple_choice"),
            QuestionKind::FreeText => write!(f, "free_text"),
        }
    }
}

impl FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "multiple_choice" | "multiple-choice" | "mc" | "choice" => {
                Ok(QuestionKind::MultipleChoice)
            }
            "free_text" | "free-text" | "text" | "essay" => Ok(QuestionKind::FreeText),
            other => Err(format!("unknown question kind: {other}")),
        }
    }
}

/// A single question within an assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub kind: QuestionKind,
    /// Maximum points for this question.
    pub points: f64,
    /// Ordered option strings (multiple-choice only).
    #[serde(default)]
    pub options: Vec<String>,
    /// Stored correct answer, in any of the accepted token encodings.
    #[serde(default)]
    pub correct_answer: Option<String>,
    /// Presentation order; lower comes first.
    #[serde(default)]
    pub order_index: u32,
}

impl Question {
    pub fn is_auto_graded(&self) -> bool {
        self.kind == QuestionKind::MultipleChoice
    }
}

/// Publication status of an assessment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentStatus {
    #[default]
    Draft,
    Published,
}

impl fmt::Display for AssessmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssessmentStatus::Draft => write!(f, "draft"),
            AssessmentStatus::Published => write!(f, "published"),
        }
    }
}

/// An instructor-authored assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub id: AssessmentId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub questions: Vec<Question>,
    /// Total time for the whole assessment, in seconds.
    pub duration_secs: u64,
    #[serde(default)]
    pub status: AssessmentStatus,
    /// Class sections this assessment is published to.
    #[serde(default)]
    pub sections: Vec<String>,
}

impl Assessment {
    /// Questions in presentation order. Ties keep authoring order.
    pub fn ordered_questions(&self) -> Vec<&Question> {
        let mut questions: Vec<&Question> = self.questions.iter().collect();
        questions.sort_by_key(|q| q.order_index);
        questions
    }

    /// Sum of all question point values.
    pub fn total_points(&self) -> f64 {
        self.questions.iter().map(|q| q.points).sum()
    }

    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// How `replacement` changes what existing submissions were answered
    /// against, or `None` if it only edits wording and answer keys.
    ///
    /// Question ids, kinds, point values and option counts must all match.
    pub fn definition_change(&self, replacement: &Assessment) -> Option<String> {
        if self.questions.len() != replacement.questions.len() {
            return Some(format!(
                "question count changes from {} to {}",
                self.questions.len(),
                replacement.questions.len()
            ));
        }
        for old in &self.questions {
            let Some(new) = replacement.question(old.id) else {
                return Some(format!("question {} is removed", old.id));
            };
            if new.kind != old.kind {
                return Some(format!("question {} changes kind", old.id));
            }
            if new.points != old.points {
                return Some(format!("question {} changes points", old.id));
            }
            if new.options.len() != old.options.len() {
                return Some(format!("question {} changes its options", old.id));
            }
        }
        None
    }
}

/// One raw answer handed to the store when a submission is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerInput {
    pub question_id: QuestionId,
    pub raw_answer: String,
}

/// Per-question answer and grading state within a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: QuestionId,
    pub raw_answer: String,
    #[serde(default)]
    pub points_earned: f64,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub is_graded: bool,
}

impl AnswerRecord {
    pub fn ungraded(question_id: QuestionId, raw_answer: impl Into<String>) -> Self {
        Self {
            question_id,
            raw_answer: raw_answer.into(),
            points_earned: 0.0,
            feedback: None,
            is_graded: false,
        }
    }
}

/// The persisted record of one student's attempt at one assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub assessment_id: AssessmentId,
    pub student_id: StudentId,
    pub answers: Vec<AnswerRecord>,
    #[serde(default)]
    pub earned: f64,
    #[serde(default)]
    pub possible: f64,
    #[serde(default)]
    pub is_graded: bool,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub graded_at: Option<DateTime<Utc>>,
}

impl Submission {
    pub fn answer(&self, question_id: QuestionId) -> Option<&AnswerRecord> {
        self.answers.iter().find(|a| a.question_id == question_id)
    }
}
