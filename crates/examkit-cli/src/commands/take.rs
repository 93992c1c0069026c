//! The `examkit take` command.
//!
//! Input lines from stdin become driver commands:
//! - any text answers the current question and moves on
//! - an empty line moves on (refused until the question is answered)
//! - `:submit` submits early, or retries a failed submit
//! - `:cancel` abandons the attempt

use std::collections::HashMap;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use examkit_core::driver::{DriveOutcome, ExamCommand, ExamDriver, ExamEvent};
use examkit_core::model::{AssessmentStatus, Question, QuestionId, QuestionKind};
use examkit_core::normalize::option_letter;
use examkit_core::session::ExamSession;

use super::{open_engine, points};

pub async fn execute(
    assessment_id: u64,
    student_id: u64,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (config, engine) = open_engine(config_path)?;
    let store = Arc::clone(engine.store());

    let assessment = store.get_assessment(assessment_id).await?;
    if assessment.status != AssessmentStatus::Published {
        anyhow::bail!("assessment {assessment_id} is a draft and cannot be taken yet");
    }
    if let Some(existing) = store
        .list_submissions(assessment_id)
        .await?
        .into_iter()
        .find(|s| s.student_id == student_id)
    {
        println!(
            "Student {student_id} already submitted this assessment (submission {}).",
            existing.id
        );
        if existing.graded_at.is_none() {
            // Stored by an attempt whose grade write never landed.
            let summary = engine.regrade_auto(existing.id).await?;
            println!(
                "Finished auto-grading: {} / {} points.",
                points(summary.aggregate.earned),
                points(summary.aggregate.possible)
            );
        }
        println!("Run: examkit show --submission {}", existing.id);
        return Ok(());
    }

    let mut session = ExamSession::new();
    session.start(&assessment)?;
    tracing::info!(
        session = %session.id(),
        assessment_id,
        student_id,
        questions = session.question_count(),
        "exam started"
    );

    println!("{} ({}s total)", assessment.title, assessment.duration_secs);
    if !assessment.description.is_empty() {
        println!("{}", assessment.description);
    }
    println!("Type an answer and press Enter. Commands: :submit, :cancel");

    let questions: HashMap<QuestionId, Question> = assessment
        .ordered_questions()
        .into_iter()
        .map(|q| (q.id, q.clone()))
        .collect();
    let total = session.question_count();

    let (command_tx, command_rx) = mpsc::channel(16);
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (line_tx, line_rx) = mpsc::unbounded_channel();

    // Blocking stdin reads live on their own thread so an idle prompt never
    // holds up runtime shutdown.
    std::thread::spawn(move || read_lines(line_tx));
    let console = tokio::spawn(interact(event_rx, line_rx, command_tx, questions, total));

    let driver = ExamDriver::new(Arc::new(engine), student_id).with_period(config.tick_period());
    let outcome = driver.run(session, command_rx, event_tx).await?;
    console.await?;

    match outcome {
        DriveOutcome::Submitted(summary) => {
            let agg = &summary.aggregate;
            println!(
                "Submitted as submission {}: {} / {} points ({:.1}%), {}",
                summary.submission_id,
                points(agg.earned),
                points(agg.possible),
                agg.percentage,
                agg.status
            );
            if !agg.is_fully_graded {
                println!("Free-text answers are awaiting manual grading.");
            }
        }
        DriveOutcome::AlreadySubmitted => {
            println!("This assessment was already submitted; nothing new was saved.");
        }
        DriveOutcome::Cancelled => println!("Attempt cancelled; nothing was saved."),
        DriveOutcome::Interrupted(session) => match session.saved_submission() {
            Some(id) => anyhow::bail!(
                "input closed before grading was recorded; submission {id} is saved and \
                 running `examkit take` again for this student finishes grading it"
            ),
            None => anyhow::bail!(
                "input closed before the exam was submitted; {} captured answer(s) discarded",
                session.answers().len()
            ),
        },
    }

    Ok(())
}

fn read_lines(lines: mpsc::UnboundedSender<String>) {
    for line in std::io::stdin().lock().lines() {
        let Ok(line) = line else { break };
        if lines.send(line).is_err() {
            break;
        }
    }
}

/// Translate input lines into commands and render events.
///
/// A line is only read once the previous one has been answered by an event,
/// so every answer is tagged with the question the student was shown.
async fn interact(
    mut events: mpsc::UnboundedReceiver<ExamEvent>,
    mut lines: mpsc::UnboundedReceiver<String>,
    commands: mpsc::Sender<ExamCommand>,
    questions: HashMap<QuestionId, Question>,
    total: usize,
) {
    let mut commands = Some(commands);
    let mut current: Option<QuestionId> = None;
    // The driver announces the first question on its own.
    let mut awaiting = true;
    let mut sent_answer = false;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if settles(&event, sent_answer) {
                    awaiting = false;
                }
                if let ExamEvent::Presenting { question_id, .. } = &event {
                    current = Some(*question_id);
                }
                render(&event, &questions, total);
            }
            line = lines.recv(), if !awaiting && commands.is_some() => {
                let Some(line) = line else {
                    // End of input closes the command channel.
                    commands = None;
                    continue;
                };
                let batch = to_commands(line.trim(), current);
                if batch.is_empty() {
                    continue;
                }
                sent_answer = batch.iter().any(|c| matches!(c, ExamCommand::Answer { .. }));
                awaiting = true;
                if let Some(tx) = &commands {
                    for command in batch {
                        if tx.send(command).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
}

fn to_commands(input: &str, current: Option<QuestionId>) -> Vec<ExamCommand> {
    match input {
        ":submit" => vec![ExamCommand::Submit],
        ":cancel" => vec![ExamCommand::Cancel],
        "" => vec![ExamCommand::Next],
        _ => match current {
            Some(question_id) => vec![
                ExamCommand::Answer {
                    question_id,
                    value: input.to_string(),
                },
                ExamCommand::Next,
            ],
            None => Vec::new(),
        },
    }
}

/// Whether `event` is the driver's response to the last batch of commands.
///
/// A rejected answer is always followed by the outcome of the `Next` sent
/// with it, so it does not count.
fn settles(event: &ExamEvent, sent_answer: bool) -> bool {
    match event {
        ExamEvent::Countdown { .. } => false,
        ExamEvent::Rejected { .. } => !sent_answer,
        _ => true,
    }
}

fn render(event: &ExamEvent, questions: &HashMap<QuestionId, Question>, total: usize) {
    match event {
        ExamEvent::Presenting {
            index,
            question_id,
            remaining_secs,
        } => {
            let Some(question) = questions.get(question_id) else {
                return;
            };
            println!(
                "\nQuestion {}/{total} [{} pt, {remaining_secs}s]",
                index + 1,
                points(question.points)
            );
            println!("{}", question.text);
            if question.kind == QuestionKind::MultipleChoice {
                for (i, option) in question.options.iter().enumerate() {
                    let label = option_letter(i)
                        .map(String::from)
                        .unwrap_or_else(|| (i + 1).to_string());
                    println!("  {label}) {option}");
                }
            }
        }
        ExamEvent::Countdown { remaining_secs } => {
            if *remaining_secs <= 5 || remaining_secs % 30 == 0 {
                println!("  ({remaining_secs}s left)");
            }
        }
        ExamEvent::AdvanceBlocked { message } => println!("  {message}"),
        ExamEvent::Rejected { message } => println!("  Not accepted: {message}"),
        ExamEvent::SubmitFailed { message, retryable } => {
            println!("  Could not save your answers: {message}");
            if *retryable {
                println!("  Your answers are kept. Type :submit to retry or :cancel to give up.");
            } else {
                println!("  Type :cancel to leave.");
            }
        }
        ExamEvent::Submitted { .. } | ExamEvent::AlreadySubmitted | ExamEvent::Cancelled => {}
    }
}
