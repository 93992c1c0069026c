//! Error types for exam delivery, grading, and persistence.
//!
//! `StoreError` lives here rather than in `examkit-store` so the session
//! driver and grading engine can classify persistence failures (duplicate vs.
//! retryable) without string matching.

use thiserror::Error;

use crate::model::{AssessmentId, QuestionId, StudentId, SubmissionId};

/// Errors raised by the exam session controller and grading engine.
#[derive(Debug, Error)]
pub enum ExamError {
    /// The assessment cannot be delivered as configured (no questions, no time).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The requested action is rejected until the student supplies input.
    #[error("validation error: {0}")]
    Validation(String),

    /// The operation is not allowed in the session's current state.
    #[error("cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    /// A question referenced by a submission is missing from its assessment.
    #[error("question {0} not found")]
    UnknownQuestion(QuestionId),

    /// The submission was created but its grades could not be written.
    ///
    /// The answers are safe; grading can be re-derived for `submission_id`.
    #[error("submission {submission_id} saved but grading not recorded: {source}")]
    GradeWriteFailed {
        submission_id: SubmissionId,
        #[source]
        source: StoreError,
    },

    /// The submission store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ExamError {
    /// Returns `true` if the caller can re-prompt the student and carry on.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ExamError::Validation(_) | ExamError::GradeWriteFailed { .. } => true,
            ExamError::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Errors that can occur when talking to a submission store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A submission already exists for this (assessment, student) pair.
    #[error("submission already exists for assessment {assessment_id}, student {student_id}")]
    DuplicateSubmission {
        assessment_id: AssessmentId,
        student_id: StudentId,
    },

    /// No assessment with this id.
    #[error("assessment {0} not found")]
    AssessmentNotFound(AssessmentId),

    /// No submission with this id.
    #[error("submission {0} not found")]
    SubmissionNotFound(SubmissionId),

    /// The assessment already has submissions and can no longer be replaced.
    #[error("assessment {0} is locked by existing submissions")]
    AssessmentLocked(AssessmentId),

    /// A locked assessment may only have its wording and answer keys changed.
    #[error("assessment {assessment_id} is locked by existing submissions and {reason}")]
    DefinitionChanged {
        assessment_id: AssessmentId,
        reason: String,
    },

    /// The backing storage failed (I/O, serialization, connectivity).
    #[error("persistence failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns `true` if repeating the same call may succeed.
    ///
    /// Duplicates, missing records and locked assessments are permanent; a
    /// caller should redirect rather than retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Backend(_))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}
