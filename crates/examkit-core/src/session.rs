//! The exam session controller.
//!
//! A single-threaded state machine that paces one student through an
//! assessment under per-question countdowns. It performs no I/O and owns no
//! timer: something else (see [`crate::driver`]) delivers one [`ExamSession::tick`]
//! per second and forwards the student's commands.
//!
//! ```text
//! Idle --start--> Presenting(0) --tick@0 / next--> Presenting(1) ... Presenting(last)
//!                                                        |
//!                      tick@0 / next / submit            v
//!                                                   Submitting --finish--> (consumed)
//! any state --cancel--> Cancelled
//! ```

use std::collections::HashSet;
use std::fmt;

use uuid::Uuid;

use crate::allocator::allocate;
use crate::error::ExamError;
use crate::model::{
    AnswerInput, Assessment, AssessmentId, CapturedAnswers, QuestionId, SubmissionId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// Showing the question at this position.
    Presenting(usize),
    /// All questions done; answers are waiting to be persisted.
    Submitting,
    Cancelled,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Presenting(i) => write!(f, "presenting question {}", i + 1),
            SessionState::Submitting => write!(f, "submitting"),
            SessionState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The current question's countdown moved down.
    Counting { remaining: u64 },
    /// Time ran out and the next question is now showing.
    Advanced { index: usize },
    /// Time ran out on the last question; the session is submitting.
    TimeUp,
    /// The session is not presenting a question.
    Ignored,
}

/// Where an explicit advance landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Question(usize),
    Submitting,
}

/// Answers of a finished session, ready for the grading engine.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedExam {
    pub session_id: Uuid,
    pub assessment_id: AssessmentId,
    /// One entry per question in presentation order; unanswered questions
    /// carry an empty token.
    pub answers: Vec<AnswerInput>,
}

/// Ephemeral, single-use state of one student's attempt.
#[derive(Debug)]
pub struct ExamSession {
    id: Uuid,
    assessment_id: Option<AssessmentId>,
    question_ids: Vec<QuestionId>,
    slices: Vec<u64>,
    state: SessionState,
    remaining: u64,
    answers: CapturedAnswers,
    /// Set once the answers are stored, even if grading them failed.
    saved_as: Option<SubmissionId>,
}

impl Default for ExamSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ExamSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            assessment_id: None,
            question_ids: Vec::new(),
            slices: Vec::new(),
            state: SessionState::Idle,
            remaining: 0,
            answers: CapturedAnswers::new(),
            saved_as: None,
        }
    }

    /// Load the assessment's questions, allocate their time slices and show
    /// the first question.
    pub fn start(&mut self, assessment: &Assessment) -> Result<(), ExamError> {
        self.require(self.state == SessionState::Idle, "start")?;

        let question_ids: Vec<QuestionId> =
            assessment.ordered_questions().iter().map(|q| q.id).collect();
        let mut seen = HashSet::new();
        if let Some(duplicate) = question_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(ExamError::Configuration(format!(
                "question id {duplicate} appears more than once"
            )));
        }
        let slices = allocate(assessment.duration_secs, question_ids.len())?;

        self.assessment_id = Some(assessment.id);
        self.remaining = slices[0];
        self.question_ids = question_ids;
        self.slices = slices;
        self.state = SessionState::Presenting(0);

        tracing::info!(
            session = %self.id,
            assessment_id = assessment.id,
            questions = self.question_ids.len(),
            "exam session started"
        );
        Ok(())
    }

    /// Advance the countdown by one second.
    ///
    /// At zero the session moves on to the next question, or to
    /// [`SessionState::Submitting`] after the last one. Captured answers are
    /// never touched.
    pub fn tick(&mut self) -> TickOutcome {
        let SessionState::Presenting(index) = self.state else {
            return TickOutcome::Ignored;
        };

        if self.remaining > 0 {
            self.remaining -= 1;
            return TickOutcome::Counting {
                remaining: self.remaining,
            };
        }

        match self.advance_from(index) {
            Advance::Question(next) => TickOutcome::Advanced { index: next },
            Advance::Submitting => TickOutcome::TimeUp,
        }
    }

    /// Record (or overwrite) the answer for the current question.
    pub fn answer(&mut self, question_id: QuestionId, value: impl Into<String>) -> Result<(), ExamError> {
        let current = self.current_question().ok_or_else(|| ExamError::InvalidState {
            operation: "answer",
            state: self.state.to_string(),
        })?;
        if current != question_id {
            return Err(ExamError::Validation(format!(
                "question {question_id} is not the current question"
            )));
        }
        self.answers.insert(question_id, value.into());
        Ok(())
    }

    /// Move to the next question, or to submitting after the last one.
    ///
    /// Rejected while the current question has no answer; an unanswered
    /// question can only be left behind by running out of time.
    pub fn next(&mut self) -> Result<Advance, ExamError> {
        let index = self.presenting_index("advance")?;
        self.require_current_answered()?;
        Ok(self.advance_from(index))
    }

    /// Enter [`SessionState::Submitting`] and expose the captured answers.
    ///
    /// From a presented question this is gated on that question being
    /// answered. Calling it again while already submitting is allowed, so a
    /// failed persist can be retried.
    pub fn submit(&mut self) -> Result<&CapturedAnswers, ExamError> {
        match self.state {
            SessionState::Presenting(_) => {
                self.require_current_answered()?;
                self.state = SessionState::Submitting;
            }
            SessionState::Submitting => {}
            _ => {
                return Err(ExamError::InvalidState {
                    operation: "submit",
                    state: self.state.to_string(),
                })
            }
        }
        Ok(&self.answers)
    }

    /// Discard the session without persisting anything.
    ///
    /// Callers that want to warn about losing work should check
    /// [`ExamSession::has_any_answer`] first.
    pub fn cancel(&mut self) {
        if self.state != SessionState::Cancelled {
            tracing::info!(session = %self.id, state = %self.state, "exam session cancelled");
        }
        self.state = SessionState::Cancelled;
        self.answers.clear();
        self.remaining = 0;
    }

    /// Consume a submitting session once its answers have been persisted.
    pub fn finish(self) -> Result<CompletedExam, ExamError> {
        self.require(self.state == SessionState::Submitting, "finish")?;
        let assessment_id = self.assessment_id.ok_or_else(|| ExamError::InvalidState {
            operation: "finish",
            state: "unstarted".into(),
        })?;
        let answers = self.answer_inputs();
        Ok(CompletedExam {
            session_id: self.id,
            assessment_id,
            answers,
        })
    }

    /// One answer per question in presentation order, empty when unanswered.
    pub fn answer_inputs(&self) -> Vec<AnswerInput> {
        self.question_ids
            .iter()
            .map(|&id| AnswerInput {
                question_id: id,
                raw_answer: self.answers.get(&id).cloned().unwrap_or_default(),
            })
            .collect()
    }

    pub fn has_any_answer(&self) -> bool {
        self.answers.values().any(|v| !v.trim().is_empty())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn assessment_id(&self) -> Option<AssessmentId> {
        self.assessment_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Seconds left on the current question.
    pub fn remaining_secs(&self) -> u64 {
        self.remaining
    }

    pub fn slices(&self) -> &[u64] {
        &self.slices
    }

    pub fn question_count(&self) -> usize {
        self.question_ids.len()
    }

    /// Id of the question being presented, if any.
    pub fn current_question(&self) -> Option<QuestionId> {
        match self.state {
            SessionState::Presenting(i) => self.question_ids.get(i).copied(),
            _ => None,
        }
    }

    pub fn answers(&self) -> &CapturedAnswers {
        &self.answers
    }

    /// The submission these answers were stored as, if they were.
    ///
    /// A session that is still submitting with this set only needs its
    /// grades written; creating the submission again would be a duplicate.
    pub fn saved_submission(&self) -> Option<SubmissionId> {
        self.saved_as
    }

    /// Remember that the answers were stored as `submission_id`.
    pub fn mark_saved(&mut self, submission_id: SubmissionId) -> Result<(), ExamError> {
        self.require(self.state == SessionState::Submitting, "mark saved")?;
        self.saved_as = Some(submission_id);
        Ok(())
    }

    fn advance_from(&mut self, index: usize) -> Advance {
        let next = index + 1;
        if next >= self.question_ids.len() {
            self.state = SessionState::Submitting;
            self.remaining = 0;
            tracing::debug!(session = %self.id, "last question closed, submitting");
            Advance::Submitting
        } else {
            self.state = SessionState::Presenting(next);
            self.remaining = self.slices[next];
            tracing::debug!(session = %self.id, index = next, remaining = self.remaining, "advanced");
            Advance::Question(next)
        }
    }

    fn presenting_index(&self, operation: &'static str) -> Result<usize, ExamError> {
        match self.state {
            SessionState::Presenting(i) => Ok(i),
            _ => Err(ExamError::InvalidState {
                operation,
                state: self.state.to_string(),
            }),
        }
    }

    fn require_current_answered(&self) -> Result<(), ExamError> {
        let answered = self
            .current_question()
            .and_then(|id| self.answers.get(&id))
            .is_some_and(|v| !v.trim().is_empty());
        if answered {
            Ok(())
        } else {
            Err(ExamError::Validation(
                "answer the current question before continuing".into(),
            ))
        }
    }

    fn require(&self, ok: bool, operation: &'static str) -> Result<(), ExamError> {
        if ok {
            Ok(())
        } else {
            Err(ExamError::InvalidState {
                operation,
                state: self.state.to_string(),
            })
        }
    }
}
