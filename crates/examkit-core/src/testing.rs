//! In-memory store and fixtures shared by this crate's unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StoreError;
use crate::model::{
    AnswerInput, AnswerRecord, Assessment, AssessmentId, AssessmentStatus, Question,
    QuestionKind, StudentId, Submission, SubmissionId,
};
use crate::traits::{GradeUpdate, SubmissionStore};

/// Two multiple-choice questions (2 points each) and one free-text question
/// (5 points), 60 seconds in total.
pub fn sample_assessment() -> Assessment {
    let capitals = vec!["Paris".to_string(), "London".into(), "Rome".into()];
    Assessment {
        id: 10,
        title: "Capitals".into(),
        description: "European capitals".into(),
        questions: vec![
            Question {
                id: 1,
                text: "Capital of France?".into(),
                kind: QuestionKind::MultipleChoice,
                points: 2.0,
                options: capitals.clone(),
                correct_answer: Some("A".into()),
                order_index: 0,
            },
            Question {
                id: 2,
                text: "Also the capital of France?".into(),
                kind: QuestionKind::MultipleChoice,
                points: 2.0,
                options: capitals,
                correct_answer: Some("Paris".into()),
                order_index: 1,
            },
            Question {
                id: 3,
                text: "Why is Paris the capital?".into(),
                kind: QuestionKind::FreeText,
                points: 5.0,
                options: vec![],
                correct_answer: None,
                order_index: 2,
            },
        ],
        duration_secs: 60,
        status: AssessmentStatus::Published,
        sections: vec!["period-1".into()],
    }
}

#[derive(Default)]
struct State {
    assessments: HashMap<AssessmentId, Assessment>,
    submissions: Vec<Submission>,
}

#[derive(Default)]
pub struct FakeStore {
    state: Mutex<State>,
    failing_grade_writes: AtomicU32,
    failing_creates: AtomicU32,
}

impl FakeStore {
    /// Make the next `n` grade writes fail with a backend error.
    pub fn fail_grade_writes(&self, n: u32) {
        self.failing_grade_writes.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` submission creates fail with a backend error.
    pub fn fail_creates(&self, n: u32) {
        self.failing_creates.store(n, Ordering::SeqCst);
    }

    /// Replace an assessment even if it is locked (answer-key correction).
    pub fn force_replace_assessment(&self, assessment: Assessment) {
        let mut state = self.state.lock().unwrap();
        state.assessments.insert(assessment.id, assessment);
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl SubmissionStore for FakeStore {
    fn name(&self) -> &str {
        "fake"
    }

    async fn create_submission(
        &self,
        assessment_id: AssessmentId,
        student_id: StudentId,
        answers: &[AnswerInput],
    ) -> Result<SubmissionId, StoreError> {
        if Self::take_failure(&self.failing_creates) {
            return Err(StoreError::Backend("injected create failure".into()));
        }
        let mut state = self.state.lock().unwrap();
        if !state.assessments.contains_key(&assessment_id) {
            return Err(StoreError::AssessmentNotFound(assessment_id));
        }
        if state
            .submissions
            .iter()
            .any(|s| s.assessment_id == assessment_id && s.student_id == student_id)
        {
            return Err(StoreError::DuplicateSubmission {
                assessment_id,
                student_id,
            });
        }
        let id = state.submissions.len() as SubmissionId + 1;
        state.submissions.push(Submission {
            id,
            assessment_id,
            student_id,
            answers: answers
                .iter()
                .map(|a| AnswerRecord::ungraded(a.question_id, a.raw_answer.clone()))
                .collect(),
            earned: 0.0,
            possible: 0.0,
            is_graded: false,
            submitted_at: Utc::now(),
            graded_at: None,
        });
        Ok(id)
    }

    async fn get_questions(&self, assessment_id: AssessmentId) -> Result<Vec<Question>, StoreError> {
        let state = self.state.lock().unwrap();
        state
            .assessments
            .get(&assessment_id)
            .map(|a| a.ordered_questions().into_iter().cloned().collect())
            .ok_or(StoreError::AssessmentNotFound(assessment_id))
    }

    async fn update_submission_grade(&self, update: &GradeUpdate) -> Result<(), StoreError> {
        if Self::take_failure(&self.failing_grade_writes) {
            return Err(StoreError::Backend("injected grade write failure".into()));
        }
        let mut state = self.state.lock().unwrap();
        let submission = state
            .submissions
            .iter_mut()
            .find(|s| s.id == update.submission_id)
            .ok_or(StoreError::SubmissionNotFound(update.submission_id))?;
        submission.earned = update.earned;
        submission.possible = update.possible;
        submission.is_graded = update.is_graded;
        submission.graded_at = Some(Utc::now());
        let answers = update
            .per_question
            .iter()
            .map(|g| {
                let raw = submission
                    .answer(g.question_id)
                    .map(|a| a.raw_answer.clone())
                    .unwrap_or_default();
                AnswerRecord {
                    question_id: g.question_id,
                    raw_answer: raw,
                    points_earned: g.points_earned,
                    feedback: g.feedback.clone(),
                    is_graded: g.is_graded,
                }
            })
            .collect();
        submission.answers = answers;
        Ok(())
    }

    async fn get_submission(&self, submission_id: SubmissionId) -> Result<Submission, StoreError> {
        let state = self.state.lock().unwrap();
        state
            .submissions
            .iter()
            .find(|s| s.id == submission_id)
            .cloned()
            .ok_or(StoreError::SubmissionNotFound(submission_id))
    }

    async fn get_assessment(&self, assessment_id: AssessmentId) -> Result<Assessment, StoreError> {
        let state = self.state.lock().unwrap();
        state
            .assessments
            .get(&assessment_id)
            .cloned()
            .ok_or(StoreError::AssessmentNotFound(assessment_id))
    }

    async fn put_assessment(&self, assessment: &Assessment) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if state
            .submissions
            .iter()
            .any(|s| s.assessment_id == assessment.id)
        {
            return Err(StoreError::AssessmentLocked(assessment.id));
        }
        state.assessments.insert(assessment.id, assessment.clone());
        Ok(())
    }

    async fn list_submissions(&self, assessment_id: AssessmentId) -> Result<Vec<Submission>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .submissions
            .iter()
            .filter(|s| s.assessment_id == assessment_id)
            .cloned()
            .collect())
    }
}
