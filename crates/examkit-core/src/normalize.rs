//! Answer token normalization and comparison.
//!
//! A multiple-choice answer may be stored as a letter ("B"), a zero-based
//! index ("1"), the full option text, or a one-based index ("2"). Authoring
//! and submission paths have historically used different encodings, so all
//! four are accepted at the same time. Tokens that passed through lossy text
//! storage may also carry JSON-array and quote artifacts such as `["B"]`.

const PREFIX_ARTIFACTS: &[&str] = &["[\"", "['"];
const SUFFIX_ARTIFACTS: &[&str] = &["\"]", "']"];
const QUOTES: &[char] = &['"', '\''];

/// Canonicalize a raw answer token for comparison.
///
/// Strips surrounding whitespace, a leading `["`/`['`, a trailing `"]`/`']`,
/// and one leading and trailing quote, repeating until nothing changes so
/// that `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(raw: &str) -> String {
    let mut current = raw;
    loop {
        let next = strip_once(current);
        if next.len() == current.len() {
            return current.to_string();
        }
        current = next;
    }
}

fn strip_once(s: &str) -> &str {
    let mut s = s.trim();
    if let Some(rest) = PREFIX_ARTIFACTS.iter().find_map(|p| s.strip_prefix(p)) {
        s = rest;
    }
    if let Some(rest) = SUFFIX_ARTIFACTS.iter().find_map(|p| s.strip_suffix(p)) {
        s = rest;
    }
    s = s.strip_prefix(QUOTES).unwrap_or(s);
    s.strip_suffix(QUOTES).unwrap_or(s)
}

/// Letter label for an option position ('A' for 0), if one exists.
pub fn option_letter(index: usize) -> Option<char> {
    u8::try_from(index)
        .ok()
        .filter(|&i| i < 26)
        .map(|i| char::from(b'A' + i))
}

/// Whether an already-normalized token names option `index` under any of the
/// four encodings. An empty token names nothing, even a blank option.
pub fn matches_position(canonical: &str, options: &[String], index: usize) -> bool {
    let Some(text) = options.get(index) else {
        return false;
    };
    if canonical.is_empty() {
        return false;
    }

    let letter_match = option_letter(index)
        .map(|l| canonical.len() == 1 && canonical.starts_with(l))
        .unwrap_or(false);

    letter_match
        || canonical == index.to_string()
        || canonical == normalize(text)
        || canonical == (index + 1).to_string()
}

/// True if both tokens resolve to option position `index`.
///
/// Each token is normalized and checked independently, so the two may use
/// different encodings (e.g. "A" and "0").
pub fn equals(token_a: &str, token_b: &str, options: &[String], index: usize) -> bool {
    matches_position(&normalize(token_a), options, index)
        && matches_position(&normalize(token_b), options, index)
}

/// Every option position a raw token can be read as.
///
/// Digits are ambiguous between zero- and one-based encodings, so a token
/// like "1" can name two positions.
pub fn resolve_positions(raw: &str, options: &[String]) -> Vec<usize> {
    let canonical = normalize(raw);
    (0..options.len())
        .filter(|&i| matches_position(&canonical, options, i))
        .collect()
}
