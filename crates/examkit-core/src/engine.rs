//! Store-backed grading orchestration.
//!
//! Wraps the pure functions in [`crate::grading`] with the reads and writes
//! a submission needs: auto-grading at submit time, instructor finalize, and
//! re-derivation after an answer-key correction. Every write recomputes the
//! aggregate from the full per-question state.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::error::ExamError;
use crate::grading::{aggregate, apply_grade, Aggregate, ManualGrade};
use crate::model::{
    AnswerInput, AnswerRecord, AssessmentId, Question, QuestionId, StudentId, Submission,
    SubmissionId,
};
use crate::traits::{GradeUpdate, QuestionGrade, SubmissionStore};

/// Outcome of a grading pass that was written to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingSummary {
    pub submission_id: SubmissionId,
    pub aggregate: Aggregate,
    /// Questions whose manual score was outside `[0, points]` and clamped.
    #[serde(default)]
    pub clamped: Vec<QuestionId>,
}

/// A submission together with the questions and totals needed to show it.
#[derive(Debug, Clone)]
pub struct SubmissionReview {
    pub submission: Submission,
    pub questions: Vec<Question>,
    pub aggregate: Aggregate,
}

/// The grading engine.
pub struct GradingEngine {
    store: Arc<dyn SubmissionStore>,
}

impl GradingEngine {
    pub fn new(store: Arc<dyn SubmissionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn SubmissionStore> {
        &self.store
    }

    /// Persist a finished attempt and auto-grade its multiple-choice items.
    ///
    /// Fails with `DuplicateSubmission` if the student already submitted. If
    /// the submission is created but the grade write fails, the error is
    /// [`ExamError::GradeWriteFailed`] and grading can be completed later with
    /// [`GradingEngine::regrade_auto`].
    pub async fn submit(
        &self,
        assessment_id: AssessmentId,
        student_id: StudentId,
        answers: &[AnswerInput],
    ) -> Result<GradingSummary, ExamError> {
        let questions = self.store.get_questions(assessment_id).await?;
        for answer in answers {
            if !questions.iter().any(|q| q.id == answer.question_id) {
                tracing::warn!(
                    assessment_id,
                    question_id = answer.question_id,
                    "answer for unknown question ignored"
                );
            }
        }

        let submission_id = self
            .store
            .create_submission(assessment_id, student_id, answers)
            .await?;

        let mut records: Vec<AnswerRecord> = questions
            .iter()
            .map(|q| {
                let raw = answers
                    .iter()
                    .find(|a| a.question_id == q.id)
                    .map(|a| a.raw_answer.as_str())
                    .unwrap_or_default();
                AnswerRecord::ungraded(q.id, raw)
            })
            .collect();
        for (record, question) in records.iter_mut().zip(&questions) {
            apply_grade(record, question, None);
        }

        let aggregate = aggregate(&questions, &records);
        let update = grade_update(submission_id, &aggregate, &records);
        if let Err(source) = self.store.update_submission_grade(&update).await {
            tracing::warn!(submission_id, error = %source, "auto-grade write failed");
            return Err(ExamError::GradeWriteFailed {
                submission_id,
                source,
            });
        }

        tracing::info!(
            submission_id,
            assessment_id,
            student_id,
            earned = aggregate.earned,
            possible = aggregate.possible,
            status = %aggregate.status,
            "submission auto-graded"
        );

        Ok(GradingSummary {
            submission_id,
            aggregate,
            clamped: Vec::new(),
        })
    }

    /// Apply instructor grades to free-text items and re-derive the whole
    /// submission.
    ///
    /// Grades for multiple-choice items are ignored (they are auto-graded
    /// only). Calling this again with the same input writes the same state.
    pub async fn finalize(
        &self,
        submission_id: SubmissionId,
        grades: &HashMap<QuestionId, ManualGrade>,
    ) -> Result<GradingSummary, ExamError> {
        let submission = self.store.get_submission(submission_id).await?;
        let questions = self.store.get_questions(submission.assessment_id).await?;

        if let Some(&unknown) = grades
            .keys()
            .find(|id| !questions.iter().any(|q| q.id == **id))
        {
            return Err(ExamError::UnknownQuestion(unknown));
        }

        let mut records = align_records(&questions, submission.answers);
        let mut clamped = Vec::new();
        for (record, question) in records.iter_mut().zip(&questions) {
            let manual = grades.get(&question.id);
            if manual.is_some() && question.is_auto_graded() {
                tracing::warn!(
                    submission_id,
                    question_id = question.id,
                    "manual grade ignored for multiple-choice question"
                );
            }
            let outcome = apply_grade(record, question, manual);
            if outcome.is_some_and(|o| o.clamped_from.is_some()) {
                clamped.push(question.id);
            }
        }

        let aggregate = aggregate(&questions, &records);
        self.store
            .update_submission_grade(&grade_update(submission_id, &aggregate, &records))
            .await?;

        tracing::info!(
            submission_id,
            graded = grades.len(),
            earned = aggregate.earned,
            possible = aggregate.possible,
            status = %aggregate.status,
            "grades finalized"
        );

        Ok(GradingSummary {
            submission_id,
            aggregate,
            clamped,
        })
    }

    /// Re-derive multiple-choice items against the current answer key.
    ///
    /// Free-text grades are left as they are. Whether this should be offered
    /// after a key correction is the caller's decision.
    pub async fn regrade_auto(&self, submission_id: SubmissionId) -> Result<GradingSummary, ExamError> {
        self.finalize(submission_id, &HashMap::new()).await
    }

    /// [`GradingEngine::regrade_auto`] for every submission of an assessment.
    pub async fn regrade_assessment(
        &self,
        assessment_id: AssessmentId,
    ) -> Result<Vec<GradingSummary>, ExamError> {
        let submissions = self.store.list_submissions(assessment_id).await?;
        try_join_all(submissions.iter().map(|s| self.regrade_auto(s.id))).await
    }

    /// Load a submission with freshly computed totals for read-only display.
    pub async fn review(&self, submission_id: SubmissionId) -> Result<SubmissionReview, ExamError> {
        let submission = self.store.get_submission(submission_id).await?;
        let questions = self.store.get_questions(submission.assessment_id).await?;
        let aggregate = aggregate(&questions, &submission.answers);
        Ok(SubmissionReview {
            submission,
            questions,
            aggregate,
        })
    }
}

/// One record per question, in question order. Records for questions that
/// are not part of the assessment are left out of the update; the store
/// keeps their raw answers.
fn align_records(questions: &[Question], answers: Vec<AnswerRecord>) -> Vec<AnswerRecord> {
    let mut by_id: HashMap<QuestionId, AnswerRecord> =
        answers.into_iter().map(|a| (a.question_id, a)).collect();
    questions
        .iter()
        .map(|q| {
            by_id
                .remove(&q.id)
                .unwrap_or_else(|| AnswerRecord::ungraded(q.id, ""))
        })
        .collect()
}

fn grade_update(
    submission_id: SubmissionId,
    aggregate: &Aggregate,
    records: &[AnswerRecord],
) -> GradeUpdate {
    GradeUpdate {
        submission_id,
        earned: aggregate.earned,
        possible: aggregate.possible,
        is_graded: aggregate.is_fully_graded,
        per_question: records
            .iter()
            .map(|r| QuestionGrade {
                question_id: r.question_id,
                points_earned: r.points_earned,
                feedback: r.feedback.clone(),
                is_graded: r.is_graded,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::grading::GradingStatus;
    use crate::testing::{sample_assessment, FakeStore};

    fn answers(pairs: &[(QuestionId, &str)]) -> Vec<AnswerInput> {
        pairs
            .iter()
            .map(|&(question_id, raw)| AnswerInput {
                question_id,
                raw_answer: raw.into(),
            })
            .collect()
    }

    async fn engine() -> (Arc<FakeStore>, GradingEngine) {
        let store = Arc::new(FakeStore::default());
        store.put_assessment(&sample_assessment()).await.unwrap();
        let engine = GradingEngine::new(store.clone());
        (store, engine)
    }

    #[tokio::test]
    async fn submit_auto_grades_multiple_choice() {
        let (store, engine) = engine().await;
        let summary = engine
            .submit(10, 5, &answers(&[(1, "0"), (2, "2"), (3, "An essay")]))
            .await
            .unwrap();

        // Q1 key "A", answered "0" -> correct. Q2 key "Paris", answered "2" -> wrong.
        assert_eq!(summary.aggregate.earned, 2.0);
        assert_eq!(summary.aggregate.possible, 9.0);
        assert!(!summary.aggregate.is_fully_graded);
        assert_eq!(summary.aggregate.status, GradingStatus::Ungraded);

        let stored = store.get_submission(summary.submission_id).await.unwrap();
        assert_eq!(stored.earned, 2.0);
        assert!(!stored.is_graded);
        assert!(stored.answer(1).unwrap().is_graded);
        assert!(!stored.answer(3).unwrap().is_graded);
    }

    #[tokio::test]
    async fn second_submit_is_duplicate() {
        let (store, engine) = engine().await;
        engine.submit(10, 5, &answers(&[(1, "A")])).await.unwrap();
        let err = engine.submit(10, 5, &answers(&[(1, "B")])).await.unwrap_err();
        assert!(matches!(
            err,
            ExamError::Store(StoreError::DuplicateSubmission {
                assessment_id: 10,
                student_id: 5
            })
        ));
        assert_eq!(store.list_submissions(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn finalize_clamps_and_completes_grading() {
        let (store, engine) = engine().await;
        let submitted = engine
            .submit(10, 5, &answers(&[(1, "A"), (2, "Paris"), (3, "essay")]))
            .await
            .unwrap();

        let mut grades = HashMap::new();
        grades.insert(3, ManualGrade::new(7.0).with_feedback("Thorough"));
        let summary = engine.finalize(submitted.submission_id, &grades).await.unwrap();

        assert_eq!(summary.clamped, vec![3]);
        assert_eq!(summary.aggregate.earned, 9.0);
        assert!(summary.aggregate.is_fully_graded);

        let stored = store.get_submission(submitted.submission_id).await.unwrap();
        let essay = stored.answer(3).unwrap();
        assert_eq!(essay.points_earned, 5.0);
        assert_eq!(essay.feedback.as_deref(), Some("Thorough"));
        assert!(stored.is_graded);
        assert!(stored.graded_at.is_some());
    }

    #[tokio::test]
    async fn finalize_is_idempotent_and_overwrites() {
        let (store, engine) = engine().await;
        let id = engine
            .submit(10, 5, &answers(&[(1, "A"), (2, "B"), (3, "essay")]))
            .await
            .unwrap()
            .submission_id;

        let mut grades = HashMap::new();
        grades.insert(3, ManualGrade::new(4.0));
        let first = engine.finalize(id, &grades).await.unwrap();
        let second = engine.finalize(id, &grades).await.unwrap();
        assert_eq!(first, second);

        grades.insert(3, ManualGrade::new(1.0));
        let lowered = engine.finalize(id, &grades).await.unwrap();
        assert_eq!(lowered.aggregate.earned, 3.0);
        assert_eq!(store.get_submission(id).await.unwrap().earned, 3.0);
    }

    #[tokio::test]
    async fn finalize_rejects_unknown_question() {
        let (_store, engine) = engine().await;
        let id = engine.submit(10, 5, &answers(&[(1, "A")])).await.unwrap().submission_id;
        let mut grades = HashMap::new();
        grades.insert(99, ManualGrade::new(1.0));
        assert!(matches!(
            engine.finalize(id, &grades).await,
            Err(ExamError::UnknownQuestion(99))
        ));
    }

    #[tokio::test]
    async fn manual_grade_on_multiple_choice_is_ignored() {
        let (_store, engine) = engine().await;
        let id = engine.submit(10, 5, &answers(&[(1, "B")])).await.unwrap().submission_id;
        let mut grades = HashMap::new();
        grades.insert(1, ManualGrade::new(2.0));
        let summary = engine.finalize(id, &grades).await.unwrap();
        assert_eq!(summary.aggregate.earned, 0.0);
    }

    #[tokio::test]
    async fn regrade_after_key_correction() {
        let (store, engine) = engine().await;
        let id = engine
            .submit(10, 5, &answers(&[(1, "B"), (2, "B")]))
            .await
            .unwrap()
            .submission_id;
        let mut grades = HashMap::new();
        grades.insert(3, ManualGrade::new(2.0));
        engine.finalize(id, &grades).await.unwrap();

        let mut corrected = sample_assessment();
        corrected.questions[0].correct_answer = Some("London".into());
        store.force_replace_assessment(corrected);

        let summaries = engine.regrade_assessment(10).await.unwrap();
        assert_eq!(summaries.len(), 1);
        // Q1 now correct (2), Q2 still wrong, essay keeps its 2 points.
        assert_eq!(summaries[0].aggregate.earned, 4.0);
    }

    #[tokio::test]
    async fn grade_write_failure_keeps_submission() {
        let (store, engine) = engine().await;
        store.fail_grade_writes(1);
        let err = engine.submit(10, 5, &answers(&[(1, "A")])).await.unwrap_err();
        let ExamError::GradeWriteFailed { submission_id, .. } = err else {
            panic!("expected GradeWriteFailed, got {err:?}");
        };
        assert!(store.get_submission(submission_id).await.is_ok());

        let summary = engine.regrade_auto(submission_id).await.unwrap();
        assert_eq!(summary.aggregate.earned, 2.0);
    }

    #[tokio::test]
    async fn review_recomputes_totals() {
        let (_store, engine) = engine().await;
        let id = engine.submit(10, 5, &answers(&[(2, "A")])).await.unwrap().submission_id;
        let review = engine.review(id).await.unwrap();
        assert_eq!(review.questions.len(), 3);
        assert_eq!(review.aggregate.earned, 2.0);
        assert_eq!(review.aggregate.possible, 9.0);
    }
}
