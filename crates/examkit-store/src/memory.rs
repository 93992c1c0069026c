//! In-process submission store.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use examkit_core::error::StoreError;
use examkit_core::model::{
    AnswerInput, Assessment, AssessmentId, Question, StudentId, Submission, SubmissionId,
};
use examkit_core::traits::{GradeUpdate, SubmissionStore};

use crate::document::StoreDocument;

/// A submission store that lives only as long as the process.
///
/// Useful for tests and dry runs. Failure injection lets callers exercise
/// retry paths without a real backend.
#[derive(Default)]
pub struct MemoryStore {
    document: Mutex<StoreDocument>,
    create_calls: AtomicU32,
    grade_calls: AtomicU32,
    failing_creates: AtomicU32,
    failing_grade_writes: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with assessments.
    pub fn with_assessments(assessments: impl IntoIterator<Item = Assessment>) -> Self {
        let mut document = StoreDocument::default();
        for assessment in assessments {
            document.assessments.insert(assessment.id, assessment);
        }
        Self {
            document: Mutex::new(document),
            ..Self::default()
        }
    }

    /// Number of `create_submission` calls made, including failed ones.
    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(Ordering::Relaxed)
    }

    /// Number of `update_submission_grade` calls made, including failed ones.
    pub fn grade_calls(&self) -> u32 {
        self.grade_calls.load(Ordering::Relaxed)
    }

    /// Make the next `n` submission creates fail with a backend error.
    pub fn fail_next_creates(&self, n: u32) {
        self.failing_creates.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` grade writes fail with a backend error.
    pub fn fail_next_grade_writes(&self, n: u32) {
        self.failing_grade_writes.store(n, Ordering::SeqCst);
    }

    /// Replace an assessment even if submissions exist against it, as long
    /// as only its wording and answer keys change.
    pub fn replace_assessment(&self, assessment: &Assessment) -> Result<(), StoreError> {
        self.lock()?.replace_assessment(assessment)
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreDocument>, StoreError> {
        self.document
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_submission(
        &self,
        assessment_id: AssessmentId,
        student_id: StudentId,
        answers: &[AnswerInput],
    ) -> Result<SubmissionId, StoreError> {
        self.create_calls.fetch_add(1, Ordering::Relaxed);
        if Self::take_failure(&self.failing_creates) {
            return Err(StoreError::Backend("injected create failure".into()));
        }
        self.lock()?
            .create_submission(assessment_id, student_id, answers)
    }

    async fn get_questions(&self, assessment_id: AssessmentId) -> Result<Vec<Question>, StoreError> {
        self.lock()?.questions(assessment_id)
    }

    async fn update_submission_grade(&self, update: &GradeUpdate) -> Result<(), StoreError> {
        self.grade_calls.fetch_add(1, Ordering::Relaxed);
        if Self::take_failure(&self.failing_grade_writes) {
            return Err(StoreError::Backend("injected grade write failure".into()));
        }
        self.lock()?.apply_grade(update)
    }

    async fn get_submission(&self, submission_id: SubmissionId) -> Result<Submission, StoreError> {
        self.lock()?.submission(submission_id)
    }

    async fn get_assessment(&self, assessment_id: AssessmentId) -> Result<Assessment, StoreError> {
        self.lock()?.assessment(assessment_id)
    }

    async fn put_assessment(&self, assessment: &Assessment) -> Result<(), StoreError> {
        self.lock()?.put_assessment(assessment)
    }

    async fn list_submissions(
        &self,
        assessment_id: AssessmentId,
    ) -> Result<Vec<Submission>, StoreError> {
        Ok(self.lock()?.submissions_for(assessment_id))
    }
}
