//! Per-question grading and score aggregation.
//!
//! Both functions are pure: they read question definitions and answer state
//! and never touch storage, so they can run concurrently across submissions.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{AnswerRecord, Question, QuestionId, QuestionKind};
use crate::normalize::equals;

/// An instructor-entered score for a free-text item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualGrade {
    pub score: f64,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl ManualGrade {
    pub fn new(score: f64) -> Self {
        Self {
            score,
            feedback: None,
        }
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }
}

/// Result of grading a single question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeOutcome {
    pub points_earned: f64,
    pub is_graded: bool,
    pub feedback: Option<String>,
    /// The out-of-range manual score that was clamped, if any.
    pub clamped_from: Option<f64>,
}

/// Grade one answer.
///
/// Multiple-choice items are always auto-graded against the stored key and
/// ignore `manual`. Free-text items stay ungraded at zero points until a
/// manual grade is supplied; the manual score is clamped to
/// `[0, question.points]`.
pub fn grade(question: &Question, raw_answer: &str, manual: Option<&ManualGrade>) -> GradeOutcome {
    match question.kind {
        QuestionKind::MultipleChoice => {
            let correct = question.correct_answer.as_deref().unwrap_or_default();
            let hit = (0..question.options.len())
                .any(|i| equals(raw_answer, correct, &question.options, i));
            GradeOutcome {
                points_earned: if hit { question.points } else { 0.0 },
                is_graded: true,
                feedback: None,
                clamped_from: None,
            }
        }
        QuestionKind::FreeText => match manual {
            None => GradeOutcome {
                points_earned: 0.0,
                is_graded: false,
                feedback: None,
                clamped_from: None,
            },
            Some(m) => {
                let (points_earned, clamped_from) = clamp_score(m.score, question.points);
                if let Some(raw) = clamped_from {
                    tracing::warn!(
                        question_id = question.id,
                        submitted = raw,
                        stored = points_earned,
                        "manual score out of range, clamped"
                    );
                }
                GradeOutcome {
                    points_earned,
                    is_graded: true,
                    feedback: m.feedback.clone(),
                    clamped_from,
                }
            }
        },
    }
}

fn clamp_score(score: f64, max: f64) -> (f64, Option<f64>) {
    let max = max.max(0.0);
    if score.is_nan() {
        return (0.0, Some(score));
    }
    let clamped = score.clamp(0.0, max);
    if clamped == score {
        (score, None)
    } else {
        (clamped, Some(score))
    }
}

/// Where a submission stands in the grading workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradingStatus {
    /// No free-text item graded yet (multiple-choice items may be).
    Ungraded,
    /// Some but not all items graded.
    PartiallyGraded,
    /// Every item graded.
    FullyGraded,
}

impl fmt::Display for GradingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradingStatus::Ungraded => write!(f, "ungraded"),
            GradingStatus::PartiallyGraded => write!(f, "partially graded"),
            GradingStatus::FullyGraded => write!(f, "fully graded"),
        }
    }
}

/// Aggregate score for a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub earned: f64,
    pub possible: f64,
    pub percentage: f64,
    pub is_fully_graded: bool,
    pub status: GradingStatus,
}

/// Recompute totals from the full per-question state.
///
/// `possible` always covers every question, answered or not. A question with
/// no answer record counts as ungraded with zero points. Point values below
/// zero count as zero on both sides, so `earned` never exceeds `possible`.
pub fn aggregate(questions: &[Question], answers: &[AnswerRecord]) -> Aggregate {
    let by_id: HashMap<QuestionId, &AnswerRecord> =
        answers.iter().map(|a| (a.question_id, a)).collect();

    let mut earned = 0.0;
    let mut possible = 0.0;
    let mut all_graded = true;
    let mut manual_graded = false;

    for q in questions {
        let max = q.points.max(0.0);
        possible += max;
        match by_id.get(&q.id) {
            Some(a) => {
                earned += a.points_earned.max(0.0).min(max);
                all_graded &= a.is_graded;
                manual_graded |= a.is_graded && !q.is_auto_graded();
            }
            None => all_graded = false,
        }
    }

    let percentage = if possible > 0.0 {
        earned / possible * 100.0
    } else {
        0.0
    };

    let status = if all_graded {
        GradingStatus::FullyGraded
    } else if manual_graded {
        GradingStatus::PartiallyGraded
    } else {
        GradingStatus::Ungraded
    };

    Aggregate {
        earned,
        possible,
        percentage,
        is_fully_graded: all_graded,
        status,
    }
}

/// Apply [`grade`] to one answer record in place.
///
/// Free-text records without a new manual grade keep their existing score,
/// feedback and graded flag and `None` is returned; re-grading overwrites,
/// never accumulates.
pub fn apply_grade(
    record: &mut AnswerRecord,
    question: &Question,
    manual: Option<&ManualGrade>,
) -> Option<GradeOutcome> {
    if !question.is_auto_graded() && manual.is_none() {
        return None;
    }
    let outcome = grade(question, &record.raw_answer, manual);
    record.points_earned = outcome.points_earned;
    record.is_graded = outcome.is_graded;
    if !question.is_auto_graded() {
        record.feedback = outcome.feedback.clone();
    }
    Some(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mc(id: QuestionId, correct: &str, points: f64) -> Question {
        Question {
            id,
            text: "Capital of France?".into(),
            kind: QuestionKind::MultipleChoice,
            points,
            options: vec!["Paris".into(), "London".into(), "Rome".into()],
            correct_answer: Some(correct.into()),
            order_index: 0,
        }
    }

    fn free_text(id: QuestionId, points: f64) -> Question {
        Question {
            id,
            text: "Explain.".into(),
            kind: QuestionKind::FreeText,
            points,
            options: vec![],
            correct_answer: None,
            order_index: 1,
        }
    }

    #[test]
    fn letter_key_index_answer_earns_points() {
        let q = mc(1, "A", 4.0);
        let outcome = grade(&q, "0", None);
        assert_eq!(outcome.points_earned, 4.0);
        assert!(outcome.is_graded);
    }

    #[test]
    fn text_key_wrong_index_earns_nothing() {
        let q = mc(1, "Paris", 4.0);
        let outcome = grade(&q, "2", None);
        assert_eq!(outcome.points_earned, 0.0);
        assert!(outcome.is_graded);
    }

    #[test]
    fn every_encoding_pair_agrees() {
        let encodings = [["A", "0", "Paris", "1"], ["B", "1", "London", "2"], ["C", "2", "Rome", "3"]];
        for (pos, forms) in encodings.iter().enumerate() {
            for key in forms {
                let q = mc(1, key, 1.0);
                for answer in forms {
                    assert_eq!(grade(&q, answer, None).points_earned, 1.0, "pos {pos}: {key} vs {answer}");
                }
            }
        }
    }

    #[test]
    fn mc_ignores_manual_grade_and_is_idempotent() {
        let q = mc(1, "C", 2.0);
        let first = grade(&q, "['Rome']", Some(&ManualGrade::new(0.0)));
        let second = grade(&q, "['Rome']", None);
        assert_eq!(first, second);
        assert_eq!(first.points_earned, 2.0);
    }

    #[test]
    fn unanswered_mc_scores_zero() {
        let q = mc(1, "A", 2.0);
        let outcome = grade(&q, "", None);
        assert_eq!(outcome.points_earned, 0.0);
        assert!(outcome.is_graded);
    }

    #[test]
    fn blank_answer_does_not_earn_blank_option_key() {
        let mut q = mc(1, "A", 2.0);
        q.options = vec!["".into(), "y".into()];
        assert_eq!(grade(&q, "", None).points_earned, 0.0);
        assert_eq!(grade(&q, "A", None).points_earned, 2.0);
    }

    #[test]
    fn free_text_waits_for_instructor() {
        let q = free_text(2, 5.0);
        let outcome = grade(&q, "Because.", None);
        assert_eq!(outcome.points_earned, 0.0);
        assert!(!outcome.is_graded);
    }

    #[test]
    fn free_text_score_is_clamped() {
        let q = free_text(2, 5.0);
        let outcome = grade(&q, "essay", Some(&ManualGrade::new(7.0)));
        assert_eq!(outcome.points_earned, 5.0);
        assert_eq!(outcome.clamped_from, Some(7.0));
        assert!(outcome.is_graded);

        let negative = grade(&q, "essay", Some(&ManualGrade::new(-1.0)));
        assert_eq!(negative.points_earned, 0.0);

        let nan = grade(&q, "essay", Some(&ManualGrade::new(f64::NAN)));
        assert_eq!(nan.points_earned, 0.0);
        assert!(nan.clamped_from.is_some());
    }

    #[test]
    fn in_range_score_kept_with_feedback() {
        let q = free_text(2, 5.0);
        let outcome = grade(&q, "essay", Some(&ManualGrade::new(3.5).with_feedback("Good start")));
        assert_eq!(outcome.points_earned, 3.5);
        assert_eq!(outcome.clamped_from, None);
        assert_eq!(outcome.feedback.as_deref(), Some("Good start"));
    }

    #[test]
    fn aggregate_tracks_grading_progress() {
        let questions = vec![mc(1, "A", 2.0), free_text(2, 5.0), free_text(3, 3.0)];
        let mut answers = vec![
            AnswerRecord::ungraded(1, "A"),
            AnswerRecord::ungraded(2, "essay one"),
            AnswerRecord::ungraded(3, "essay two"),
        ];
        apply_grade(&mut answers[0], &questions[0], None);

        let agg = aggregate(&questions, &answers);
        assert_eq!(agg.earned, 2.0);
        assert_eq!(agg.possible, 10.0);
        assert_eq!(agg.percentage, 20.0);
        assert!(!agg.is_fully_graded);
        assert_eq!(agg.status, GradingStatus::Ungraded);

        apply_grade(&mut answers[1], &questions[1], Some(&ManualGrade::new(4.0)));
        let agg = aggregate(&questions, &answers);
        assert_eq!(agg.earned, 6.0);
        assert_eq!(agg.status, GradingStatus::PartiallyGraded);

        apply_grade(&mut answers[2], &questions[2], Some(&ManualGrade::new(3.0)));
        let agg = aggregate(&questions, &answers);
        assert_eq!(agg.earned, 9.0);
        assert!(agg.is_fully_graded);
        assert_eq!(agg.status, GradingStatus::FullyGraded);
    }

    #[test]
    fn regrade_overwrites_instead_of_adding() {
        let questions = vec![free_text(2, 5.0)];
        let mut answers = vec![AnswerRecord::ungraded(2, "essay")];
        apply_grade(&mut answers[0], &questions[0], Some(&ManualGrade::new(4.0)));
        apply_grade(&mut answers[0], &questions[0], Some(&ManualGrade::new(2.0)));
        assert_eq!(aggregate(&questions, &answers).earned, 2.0);

        apply_grade(&mut answers[0], &questions[0], None);
        assert_eq!(answers[0].points_earned, 2.0);
        assert!(answers[0].is_graded);
    }

    #[test]
    fn aggregate_possible_ignores_progress_and_caps_earned() {
        let questions = vec![mc(1, "A", 2.0), free_text(2, 5.0)];
        let mut tampered = AnswerRecord::ungraded(2, "essay");
        tampered.points_earned = 50.0;
        tampered.is_graded = true;
        let agg = aggregate(&questions, &[tampered]);
        assert_eq!(agg.possible, 7.0);
        assert!(agg.earned <= agg.possible);
        assert!(!agg.is_fully_graded);
    }

    #[test]
    fn negative_point_values_count_as_zero() {
        let questions = vec![mc(1, "A", -1.0), mc(2, "A", 2.0)];
        let mut answers = vec![AnswerRecord::ungraded(1, "A"), AnswerRecord::ungraded(2, "A")];
        for (record, question) in answers.iter_mut().zip(&questions) {
            apply_grade(record, question, None);
        }
        let agg = aggregate(&questions, &answers);
        assert_eq!(agg.possible, 2.0);
        assert_eq!(agg.earned, 2.0);
        assert_eq!(agg.percentage, 100.0);

        let nan = vec![mc(3, "A", f64::NAN)];
        let agg = aggregate(&nan, &[AnswerRecord::ungraded(3, "A")]);
        assert_eq!(agg.possible, 0.0);
        assert_eq!(agg.earned, 0.0);
    }

    #[test]
    fn empty_assessment_has_zero_percentage() {
        let agg = aggregate(&[], &[]);
        assert_eq!(agg.possible, 0.0);
        assert_eq!(agg.percentage, 0.0);
        assert!(agg.is_fully_graded);
    }
}
