//! JSON file submission store.
//!
//! The whole store is one JSON document. Every mutation rewrites it through a
//! temporary file and a rename, so a crash leaves either the old or the new
//! document on disk, never a torn one.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use examkit_core::error::StoreError;
use examkit_core::model::{
    AnswerInput, Assessment, AssessmentId, Question, StudentId, Submission, SubmissionId,
};
use examkit_core::traits::{GradeUpdate, SubmissionStore};

use crate::document::StoreDocument;

/// A submission store backed by a single JSON file.
pub struct JsonFileStore {
    path: PathBuf,
    document: Mutex<StoreDocument>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let document = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content).map_err(|e| {
                StoreError::Backend(format!("corrupt store file {}: {e}", path.display()))
            })?
        } else {
            StoreDocument::default()
        };
        tracing::debug!(path = %path.display(), "opened json store");

        Ok(Self {
            path,
            document: Mutex::new(document),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace an assessment even if submissions exist against it, as long
    /// as only its wording and answer keys change.
    pub async fn replace_assessment(&self, assessment: &Assessment) -> Result<(), StoreError> {
        self.mutate(|doc| doc.replace_assessment(assessment)).await
    }

    /// Apply `change` to a copy of the document and persist it. The in-memory
    /// document only changes once the write has landed.
    async fn mutate<T>(
        &self,
        change: impl FnOnce(&mut StoreDocument) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut document = self.document.lock().await;
        let mut next = document.clone();
        let value = change(&mut next)?;
        self.commit(&mut document, next).await?;
        Ok(value)
    }

    async fn commit(
        &self,
        current: &mut StoreDocument,
        next: StoreDocument,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&next)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        *current = next;
        Ok(())
    }
}

#[async_trait]
impl SubmissionStore for JsonFileStore {
    fn name(&self) -> &str {
        "json"
    }

    async fn create_submission(
        &self,
        assessment_id: AssessmentId,
        student_id: StudentId,
        answers: &[AnswerInput],
    ) -> Result<SubmissionId, StoreError> {
        let id = self
            .mutate(|doc| doc.create_submission(assessment_id, student_id, answers))
            .await?;
        tracing::debug!(submission_id = id, assessment_id, student_id, "submission stored");
        Ok(id)
    }

    async fn get_questions(&self, assessment_id: AssessmentId) -> Result<Vec<Question>, StoreError> {
        self.document.lock().await.questions(assessment_id)
    }

    async fn update_submission_grade(&self, update: &GradeUpdate) -> Result<(), StoreError> {
        self.mutate(|doc| doc.apply_grade(update)).await
    }

    async fn get_submission(&self, submission_id: SubmissionId) -> Result<Submission, StoreError> {
        self.document.lock().await.submission(submission_id)
    }

    async fn get_assessment(&self, assessment_id: AssessmentId) -> Result<Assessment, StoreError> {
        self.document.lock().await.assessment(assessment_id)
    }

    async fn put_assessment(&self, assessment: &Assessment) -> Result<(), StoreError> {
        self.mutate(|doc| doc.put_assessment(assessment)).await
    }

    async fn list_submissions(
        &self,
        assessment_id: AssessmentId,
    ) -> Result<Vec<Submission>, StoreError> {
        Ok(self.document.lock().await.submissions_for(assessment_id))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use examkit_core::engine::GradingEngine;
    use examkit_core::grading::{GradingStatus, ManualGrade};

    use super::*;
    use crate::document::fixtures::{answers, assessment};

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("store.json")).unwrap();
        assert!(matches!(
            store.get_assessment(1).await,
            Err(StoreError::AssessmentNotFound(1))
        ));
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.put_assessment(&assessment(10)).await.unwrap();
        let id = store.create_submission(10, 5, &answers()).await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        let submission = reopened.get_submission(id).await.unwrap();
        assert_eq!(submission.answers[0].raw_answer, "London");
        assert!(matches!(
            reopened.create_submission(10, 5, &answers()).await,
            Err(StoreError::DuplicateSubmission { .. })
        ));
        assert_eq!(reopened.create_submission(10, 6, &answers()).await.unwrap(), id + 1);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn failed_change_leaves_document_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("store.json")).unwrap();
        store.put_assessment(&assessment(10)).await.unwrap();
        store.create_submission(10, 5, &answers()).await.unwrap();

        assert!(store.put_assessment(&assessment(10)).await.is_err());
        assert_eq!(store.list_submissions(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn locked_assessment_keeps_its_questions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = Arc::new(JsonFileStore::open(&path).unwrap());
        store.put_assessment(&assessment(10)).await.unwrap();
        let engine = GradingEngine::new(store.clone());
        let id = engine.submit(10, 5, &answers()).await.unwrap().submission_id;

        let mut without_essay = assessment(10);
        without_essay.questions.pop();
        assert!(matches!(
            store.replace_assessment(&without_essay).await,
            Err(StoreError::DefinitionChanged { assessment_id: 10, .. })
        ));

        let mut corrected = assessment(10);
        corrected.questions[0].correct_answer = Some("A".into());
        store.replace_assessment(&corrected).await.unwrap();
        let summary = engine.regrade_auto(id).await.unwrap();
        assert_eq!(summary.aggregate.earned, 0.0);

        let reopened = JsonFileStore::open(&path).unwrap();
        let stored = reopened.get_submission(id).await.unwrap();
        assert_eq!(stored.answer(2).unwrap().raw_answer, "Big and rainy.");
        assert_eq!(reopened.get_questions(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn corrupt_file_is_backend_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = JsonFileStore::open(&path).err().unwrap();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("corrupt store file"));
    }

    #[tokio::test]
    async fn finalize_persists_manual_grade() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = Arc::new(JsonFileStore::open(&path).unwrap());
        store.put_assessment(&assessment(10)).await.unwrap();

        let engine = GradingEngine::new(store);
        let summary = engine.submit(10, 5, &answers()).await.unwrap();

        let mut grades = HashMap::new();
        grades.insert(2, ManualGrade::new(4.0).with_feedback("Good detail"));
        let finalized = engine.finalize(summary.submission_id, &grades).await.unwrap();
        assert_eq!(finalized.aggregate.earned, 6.0);
        assert_eq!(finalized.aggregate.status, GradingStatus::FullyGraded);

        let reopened = JsonFileStore::open(&path).unwrap();
        let stored = reopened.get_submission(summary.submission_id).await.unwrap();
        assert!(stored.is_graded);
        assert_eq!(stored.earned, 6.0);
        assert_eq!(stored.answers[1].feedback.as_deref(), Some("Good detail"));
    }
}
