//! Countdown driver for an exam session.
//!
//! Feeds one tick per period and the student's commands into an
//! [`ExamSession`] from a single task, so ticks and answer captures are
//! handled strictly one at a time. The countdown is a plain
//! `tokio::time::interval`; tests fast-forward it with paused time.
//!
//! Ticks never touch the store. Persistence happens once the session reaches
//! `Submitting`, and a failed persist keeps the session (and its answers)
//! alive until the student retries or explicitly cancels.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::engine::{GradingEngine, GradingSummary};
use crate::error::{ExamError, StoreError};
use crate::model::{QuestionId, StudentId};
use crate::session::{Advance, ExamSession, SessionState, TickOutcome};

/// Input from the student's interactive flow.
#[derive(Debug, Clone, PartialEq)]
pub enum ExamCommand {
    Answer {
        question_id: QuestionId,
        value: String,
    },
    Next,
    Submit,
    /// Abandon the attempt. Also confirms abandonment after a failed submit.
    Cancel,
}

/// Notifications for whatever renders the exam.
#[derive(Debug, Clone, PartialEq)]
pub enum ExamEvent {
    Presenting {
        index: usize,
        question_id: QuestionId,
        remaining_secs: u64,
    },
    Countdown {
        remaining_secs: u64,
    },
    /// Next/Submit was refused; show the message inline and re-prompt.
    AdvanceBlocked {
        message: String,
    },
    /// A command was not valid in the current state.
    Rejected {
        message: String,
    },
    Submitted {
        summary: GradingSummary,
    },
    /// Saving failed. The answers are kept; send `Submit` to retry.
    SubmitFailed {
        message: String,
        retryable: bool,
    },
    /// This student already has a submission; show the read-only result.
    AlreadySubmitted,
    Cancelled,
}

/// How a driven session ended.
#[derive(Debug)]
pub enum DriveOutcome {
    Submitted(GradingSummary),
    AlreadySubmitted,
    Cancelled,
    /// The command channel closed before the attempt was fully saved. The
    /// session is handed back with its answers, and with the submission id if
    /// only the grade write is outstanding, so it can be driven again.
    Interrupted(ExamSession),
}

/// Runs started sessions for one student against a grading engine.
pub struct ExamDriver {
    engine: Arc<GradingEngine>,
    student_id: StudentId,
    period: Duration,
}

impl ExamDriver {
    pub fn new(engine: Arc<GradingEngine>, student_id: StudentId) -> Self {
        Self {
            engine,
            student_id,
            period: Duration::from_secs(1),
        }
    }

    /// Override the tick period (one countdown second).
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Drive a started session until it is submitted, cancelled, or the
    /// command channel closes.
    pub async fn run(
        &self,
        mut session: ExamSession,
        mut commands: mpsc::Receiver<ExamCommand>,
        events: mpsc::UnboundedSender<ExamEvent>,
    ) -> Result<DriveOutcome, ExamError> {
        let emit = |event: ExamEvent| {
            // The renderer may have gone away; the session carries on regardless.
            let _ = events.send(event);
        };

        if session.state() == SessionState::Cancelled || session.state() == SessionState::Idle {
            return Err(ExamError::InvalidState {
                operation: "drive",
                state: session.state().to_string(),
            });
        }
        if let Some(event) = presenting_event(&session) {
            emit(event);
        }

        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut awaiting_retry = false;

        loop {
            if session.state() == SessionState::Submitting && !awaiting_retry {
                match self.persist(&mut session).await {
                    Ok(summary) => {
                        session.finish()?;
                        emit(ExamEvent::Submitted {
                            summary: summary.clone(),
                        });
                        return Ok(DriveOutcome::Submitted(summary));
                    }
                    Err(ExamError::Store(StoreError::DuplicateSubmission { .. })) => {
                        session.cancel();
                        emit(ExamEvent::AlreadySubmitted);
                        return Ok(DriveOutcome::AlreadySubmitted);
                    }
                    Err(e) => {
                        tracing::warn!(session = %session.id(), error = %e, "submit failed, answers retained");
                        emit(ExamEvent::SubmitFailed {
                            message: e.to_string(),
                            retryable: e.is_recoverable(),
                        });
                        awaiting_retry = true;
                    }
                }
            }

            let presenting = matches!(session.state(), SessionState::Presenting(_));

            tokio::select! {
                _ = ticker.tick(), if presenting => {
                    match session.tick() {
                        TickOutcome::Counting { remaining } => {
                            emit(ExamEvent::Countdown { remaining_secs: remaining });
                        }
                        TickOutcome::Advanced { .. } => {
                            if let Some(event) = presenting_event(&session) {
                                emit(event);
                            }
                        }
                        TickOutcome::TimeUp | TickOutcome::Ignored => {}
                    }
                }
                command = commands.recv() => {
                    let Some(command) = command else {
                        tracing::debug!(session = %session.id(), "command channel closed");
                        return Ok(DriveOutcome::Interrupted(session));
                    };
                    match command {
                        ExamCommand::Answer { question_id, value } => {
                            if let Err(e) = session.answer(question_id, value) {
                                emit(ExamEvent::Rejected { message: e.to_string() });
                            }
                        }
                        ExamCommand::Next => match session.next() {
                            Ok(Advance::Question(_)) => {
                                ticker.reset();
                                if let Some(event) = presenting_event(&session) {
                                    emit(event);
                                }
                            }
                            Ok(Advance::Submitting) => {}
                            Err(e) => emit(blocked_event(e)),
                        },
                        ExamCommand::Submit => match session.submit() {
                            Ok(_) => awaiting_retry = false,
                            Err(e) => emit(blocked_event(e)),
                        },
                        ExamCommand::Cancel => {
                            session.cancel();
                            emit(ExamEvent::Cancelled);
                            return Ok(DriveOutcome::Cancelled);
                        }
                    }
                }
            }
        }
    }

    async fn persist(&self, session: &mut ExamSession) -> Result<GradingSummary, ExamError> {
        if let Some(submission_id) = session.saved_submission() {
            return self.engine.regrade_auto(submission_id).await;
        }

        let assessment_id = session.assessment_id().ok_or_else(|| ExamError::InvalidState {
            operation: "submit",
            state: "unstarted".into(),
        })?;
        let answers = session.answer_inputs();
        match self
            .engine
            .submit(assessment_id, self.student_id, &answers)
            .await
        {
            Err(ExamError::GradeWriteFailed {
                submission_id,
                source,
            }) => {
                session.mark_saved(submission_id)?;
                Err(ExamError::GradeWriteFailed {
                    submission_id,
                    source,
                })
            }
            other => other,
        }
    }
}

fn presenting_event(session: &ExamSession) -> Option<ExamEvent> {
    match session.state() {
        SessionState::Presenting(index) => Some(ExamEvent::Presenting {
            index,
            question_id: session.current_question()?,
            remaining_secs: session.remaining_secs(),
        }),
        _ => None,
    }
}

fn blocked_event(err: ExamError) -> ExamEvent {
    match err {
        ExamError::Validation(message) => ExamEvent::AdvanceBlocked { message },
        other => ExamEvent::Rejected {
            message: other.to_string(),
        },
    }
}
