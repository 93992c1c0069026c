//! The submission store contract.
//!
//! This is the subsystem's only external boundary. Implementations live in
//! the `examkit-store` crate; tests in this crate use a small in-module fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::{
    AnswerInput, Assessment, AssessmentId, Question, QuestionId, StudentId, Submission,
    SubmissionId,
};

/// Persistent storage for assessments, submissions and grades.
///
/// Implementations are responsible for serializing writes to a single
/// submission; the grading engine performs no locking of its own.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Human-readable backend name (e.g. "memory").
    fn name(&self) -> &str;

    /// Create the one submission for an (assessment, student) pair.
    ///
    /// Fails with [`StoreError::DuplicateSubmission`] if one already exists.
    async fn create_submission(
        &self,
        assessment_id: AssessmentId,
        student_id: StudentId,
        answers: &[AnswerInput],
    ) -> Result<SubmissionId, StoreError>;

    /// Questions of an assessment in presentation order.
    async fn get_questions(&self, assessment_id: AssessmentId)
        -> Result<Vec<Question>, StoreError>;

    /// Overwrite the grading state of a submission. Must be idempotent.
    async fn update_submission_grade(&self, update: &GradeUpdate) -> Result<(), StoreError>;

    /// Full submission record.
    async fn get_submission(&self, submission_id: SubmissionId) -> Result<Submission, StoreError>;

    /// Full assessment definition.
    async fn get_assessment(&self, assessment_id: AssessmentId) -> Result<Assessment, StoreError>;

    /// Insert or replace an assessment.
    ///
    /// Fails with [`StoreError::AssessmentLocked`] once any submission exists
    /// against it.
    async fn put_assessment(&self, assessment: &Assessment) -> Result<(), StoreError>;

    /// All submissions for an assessment.
    async fn list_submissions(
        &self,
        assessment_id: AssessmentId,
    ) -> Result<Vec<Submission>, StoreError>;
}

/// Grading state written back to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeUpdate {
    pub submission_id: SubmissionId,
    pub earned: f64,
    pub possible: f64,
    pub is_graded: bool,
    pub per_question: Vec<QuestionGrade>,
}

/// Grading state for one question within a [`GradeUpdate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionGrade {
    pub question_id: QuestionId,
    pub points_earned: f64,
    #[serde(default)]
    pub feedback: Option<String>,
    pub is_graded: bool,
}
