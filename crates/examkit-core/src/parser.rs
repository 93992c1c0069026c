//! TOML assessment parser.
//!
//! Loads instructor-authored assessments from TOML files and directories,
//! and validates them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::allocator::overrun_secs;
use crate::model::{Assessment, AssessmentStatus, Question, QuestionId, QuestionKind};
use crate::normalize::resolve_positions;

/// Intermediate TOML structure for parsing assessment files.
#[derive(Debug, Deserialize)]
struct TomlAssessmentFile {
    assessment: TomlAssessmentHeader,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlAssessmentHeader {
    id: u64,
    title: String,
    #[serde(default)]
    description: String,
    duration_secs: u64,
    #[serde(default)]
    status: AssessmentStatus,
    #[serde(default)]
    sections: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    #[serde(default)]
    id: Option<QuestionId>,
    text: String,
    kind: String,
    #[serde(default = "default_points")]
    points: f64,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    order: Option<u32>,
}

fn default_points() -> f64 {
    1.0
}

/// Parse a single TOML file into an `Assessment`.
pub fn parse_assessment(path: &Path) -> Result<Assessment> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read assessment file: {}", path.display()))?;

    parse_assessment_str(&content, path)
}

/// Parse a TOML string into an `Assessment` (useful for testing).
///
/// Questions without an explicit `id` are numbered from 1 by position, and
/// questions without an `order` keep their position in the file.
pub fn parse_assessment_str(content: &str, source_path: &Path) -> Result<Assessment> {
    let parsed: TomlAssessmentFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let questions = parsed
        .questions
        .into_iter()
        .enumerate()
        .map(|(position, q)| {
            let kind: QuestionKind = q.kind.parse().map_err(|e: String| anyhow::anyhow!("{}", e))?;
            Ok(Question {
                id: q.id.unwrap_or(position as QuestionId + 1),
                text: q.text,
                kind,
                points: q.points,
                options: q.options,
                correct_answer: q.answer,
                order_index: q.order.unwrap_or(position as u32),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Assessment {
        id: parsed.assessment.id,
        title: parsed.assessment.title,
        description: parsed.assessment.description,
        questions,
        duration_secs: parsed.assessment.duration_secs,
        status: parsed.assessment.status,
        sections: parsed.assessment.sections,
    })
}

/// Recursively load all `.toml` assessment files from a directory.
pub fn load_assessment_directory(dir: &Path) -> Result<Vec<Assessment>> {
    let mut assessments = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    paths.sort();

    for path in paths {
        if path.is_dir() {
            assessments.extend(load_assessment_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_assessment(&path) {
                Ok(assessment) => assessments.push(assessment),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(assessments)
}

/// Load a single file, or every assessment under a directory.
pub fn load_assessments(path: &Path) -> Result<Vec<Assessment>> {
    if path.is_dir() {
        load_assessment_directory(path)
    } else {
        Ok(vec![parse_assessment(path)?])
    }
}

/// A warning from assessment validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<QuestionId>,
    /// Warning message.
    pub message: String,
    /// The assessment must not be imported while this holds.
    pub blocking: bool,
}

impl ValidationWarning {
    fn question(id: QuestionId, message: impl Into<String>) -> Self {
        Self {
            question_id: Some(id),
            message: message.into(),
            blocking: false,
        }
    }

    fn blocking(question_id: Option<QuestionId>, message: impl Into<String>) -> Self {
        Self {
            question_id,
            message: message.into(),
            blocking: true,
        }
    }
}

/// Validate an assessment for common authoring mistakes.
///
/// Blocking findings (nothing to start, duplicate question ids, point values
/// that are not positive) make the assessment unusable; the rest are advisory.
pub fn validate_assessment(assessment: &Assessment) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if assessment.questions.is_empty() {
        warnings.push(ValidationWarning::blocking(
            None,
            "assessment has no questions and cannot be started",
        ));
    }

    if assessment.duration_secs == 0 {
        warnings.push(ValidationWarning::blocking(
            None,
            "duration_secs is 0; the assessment cannot be started",
        ));
    } else {
        let overrun = overrun_secs(assessment.duration_secs, assessment.questions.len());
        if overrun > 0 {
            warnings.push(ValidationWarning {
                question_id: None,
                message: format!(
                    "more questions than seconds; each question gets 1s and the exam runs {overrun}s over"
                ),
                blocking: false,
            });
        }
    }

    let mut seen_ids = HashSet::new();
    for q in &assessment.questions {
        if !seen_ids.insert(q.id) {
            warnings.push(ValidationWarning::blocking(
                Some(q.id),
                format!("duplicate question ID: {}", q.id),
            ));
        }

        if !(q.points > 0.0 && q.points.is_finite()) {
            warnings.push(ValidationWarning::blocking(Some(q.id), "points must be positive"));
        }

        match q.kind {
            QuestionKind::MultipleChoice => {
                if q.options.len() < 2 {
                    warnings.push(ValidationWarning::question(
                        q.id,
                        "multiple-choice question needs at least two options",
                    ));
                }
                if q.options.len() > 26 {
                    warnings.push(ValidationWarning::question(
                        q.id,
                        "more than 26 options; letter answers only reach Z",
                    ));
                }
                match &q.correct_answer {
                    None => warnings.push(ValidationWarning::question(
                        q.id,
                        "multiple-choice question has no answer key",
                    )),
                    Some(key) if resolve_positions(key, &q.options).is_empty() => {
                        warnings.push(ValidationWarning::question(
                            q.id,
                            format!("answer key {key:?} does not match any option"),
                        ));
                    }
                    Some(_) => {}
                }
            }
            QuestionKind::FreeText => {
                if !q.options.is_empty() {
                    warnings.push(ValidationWarning::question(
                        q.id,
                        "free-text question has options that will be ignored",
                    ));
                }
            }
        }
    }

    warnings
}
