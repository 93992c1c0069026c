//! The store document shared by every backend.
//!
//! Backends differ only in where the document lives and how access to it is
//! serialized; the record-keeping rules are all here.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use examkit_core::error::StoreError;
use examkit_core::model::{
    AnswerInput, AnswerRecord, Assessment, AssessmentId, Question, StudentId, Submission,
    SubmissionId,
};
use examkit_core::traits::GradeUpdate;

/// Every assessment and submission a store holds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(default)]
    pub assessments: BTreeMap<AssessmentId, Assessment>,
    #[serde(default)]
    pub submissions: BTreeMap<SubmissionId, Submission>,
    /// Last submission id handed out. Ids are never reused.
    #[serde(default)]
    pub last_submission_id: SubmissionId,
}

impl StoreDocument {
    pub fn create_submission(
        &mut self,
        assessment_id: AssessmentId,
        student_id: StudentId,
        answers: &[AnswerInput],
    ) -> Result<SubmissionId, StoreError> {
        if !self.assessments.contains_key(&assessment_id) {
            return Err(StoreError::AssessmentNotFound(assessment_id));
        }
        if self
            .submissions
            .values()
            .any(|s| s.assessment_id == assessment_id && s.student_id == student_id)
        {
            return Err(StoreError::DuplicateSubmission {
                assessment_id,
                student_id,
            });
        }

        self.last_submission_id += 1;
        let id = self.last_submission_id;
        self.submissions.insert(
            id,
            Submission {
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
            },
        );
        Ok(id)
    }

    pub fn questions(&self, assessment_id: AssessmentId) -> Result<Vec<Question>, StoreError> {
        self.assessments
            .get(&assessment_id)
            .map(|a| a.ordered_questions().into_iter().cloned().collect())
            .ok_or(StoreError::AssessmentNotFound(assessment_id))
    }

    /// Overwrite grading state. Raw answers are kept from the original
    /// submission; a graded question with no stored answer gets an empty one.
    /// Stored answers the update does not mention are kept as they are.
    pub fn apply_grade(&mut self, update: &GradeUpdate) -> Result<(), StoreError> {
        let submission = self
            .submissions
            .get_mut(&update.submission_id)
            .ok_or(StoreError::SubmissionNotFound(update.submission_id))?;

        let mut answers: Vec<AnswerRecord> = update
            .per_question
            .iter()
            .map(|g| AnswerRecord {
                question_id: g.question_id,
                raw_answer: submission
                    .answer(g.question_id)
                    .map(|a| a.raw_answer.clone())
                    .unwrap_or_default(),
                points_earned: g.points_earned,
                feedback: g.feedback.clone(),
                is_graded: g.is_graded,
            })
            .collect();
        answers.extend(
            submission
                .answers
                .iter()
                .filter(|a| !update.per_question.iter().any(|g| g.question_id == a.question_id))
                .cloned(),
        );

        submission.answers = answers;
        submission.earned = update.earned;
        submission.possible = update.possible;
        submission.is_graded = update.is_graded;
        submission.graded_at = Some(Utc::now());
        Ok(())
    }

    pub fn submission(&self, submission_id: SubmissionId) -> Result<Submission, StoreError> {
        self.submissions
            .get(&submission_id)
            .cloned()
            .ok_or(StoreError::SubmissionNotFound(submission_id))
    }

    pub fn assessment(&self, assessment_id: AssessmentId) -> Result<Assessment, StoreError> {
        self.assessments
            .get(&assessment_id)
            .cloned()
            .ok_or(StoreError::AssessmentNotFound(assessment_id))
    }

    pub fn put_assessment(&mut self, assessment: &Assessment) -> Result<(), StoreError> {
        if self.is_locked(assessment.id) {
            return Err(StoreError::AssessmentLocked(assessment.id));
        }
        self.assessments.insert(assessment.id, assessment.clone());
        Ok(())
    }

    /// Replace an assessment even when submissions exist against it.
    ///
    /// Once locked, only wording and answer keys may change; callers are
    /// expected to regrade.
    pub fn replace_assessment(&mut self, assessment: &Assessment) -> Result<(), StoreError> {
        if self.is_locked(assessment.id) {
            if let Some(reason) = self
                .assessments
                .get(&assessment.id)
                .and_then(|current| current.definition_change(assessment))
            {
                return Err(StoreError::DefinitionChanged {
                    assessment_id: assessment.id,
                    reason,
                });
            }
        }
        self.assessments.insert(assessment.id, assessment.clone());
        Ok(())
    }

    pub fn submissions_for(&self, assessment_id: AssessmentId) -> Vec<Submission> {
        self.submissions
            .values()
            .filter(|s| s.assessment_id == assessment_id)
            .cloned()
            .collect()
    }

    pub fn is_locked(&self, assessment_id: AssessmentId) -> bool {
        self.submissions
            .values()
            .any(|s| s.assessment_id == assessment_id)
    }
}
