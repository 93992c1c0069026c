//! Time budget allocation.
//!
//! Splits an assessment's total duration into one countdown slice per
//! question.

use crate::error::ExamError;

/// Split `total_secs` into `count` integer slices.
///
/// base = total / count, r = total % count; the first r slices get base + 1,
/// the rest get base. When `count <= total` the slices sum exactly to
/// `total_secs`.
///
/// When there are more questions than seconds, every slice is floored to one
/// second, so the allocation overruns the nominal duration. This is a
/// deliberate policy; see [`overrun_secs`].
pub fn allocate(total_secs: u64, count: usize) -> Result<Vec<u64>, ExamError> {
    if total_secs < 1 {
        return Err(ExamError::Configuration(
            "assessment duration must be at least 1 second".into(),
        ));
    }
    if count == 0 {
        return Err(ExamError::Configuration(
            "assessment has no questions".into(),
        ));
    }

    let n = count as u64;
    let base = total_secs / n;
    let remainder = total_secs % n;

    let slices: Vec<u64> = (0..n)
        .map(|i| if i < remainder { base + 1 } else { base })
        .map(|s| s.max(1))
        .collect();

    let overrun = overrun_secs(total_secs, count);
    if overrun > 0 {
        tracing::warn!(
            total_secs,
            count,
            overrun,
            "more questions than seconds, each question floored to 1s"
        );
    }

    Ok(slices)
}

/// Seconds by which [`allocate`] exceeds `total_secs` because of the
/// one-second floor. Zero whenever `count <= total_secs`.
pub fn overrun_secs(total_secs: u64, count: usize) -> u64 {
    (count as u64).saturating_sub(total_secs)
}
