//! Heuristic classification of a delta by diffing rendered text.
//!
//! Only the text before and after the delta is compared, so a single
//! delta carrying interleaved edits from several actors cannot be
//! disambiguated.

use crate::types::OperationKind;

/// Outcome of comparing the text before and after a delta.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classification {
    pub operation: OperationKind,
    /// Char offset of the first difference (0 when unknown).
    pub offset: usize,
    /// Inserted text. Withheld for deletes and format changes.
    pub content: Option<String>,
    pub content_length: Option<usize>,
}

/// Classify the effect of a delta.
///
/// * longer text: insert; the inserted run is recovered when `before`
///   survives as a prefix and suffix of `after`, otherwise the first
///   `fallback_chars` chars of `after` are captured
/// * shorter text: delete
/// * same length, different text: format
/// * identical text: unknown
pub fn classify(before: &str, after: &str, fallback_chars: usize) -> Classification {
    let b: Vec<char> = before.chars().collect();
    let a: Vec<char> = after.chars().collect();

    if a.len() > b.len() {
        let (prefix, suffix) = common_affixes(&b, &a);
        if prefix + suffix == b.len() {
            let inserted: String = a[prefix..a.len() - suffix].iter().collect();
            let len = a.len() - b.len();
            return Classification {
                operation: OperationKind::Insert,
                offset: prefix,
                content: Some(inserted),
                content_length: Some(len),
            };
        }

        let captured: String = a.iter().take(fallback_chars.min(a.len())).collect();
        return Classification {
            operation: OperationKind::Insert,
            offset: 0,
            content: Some(captured),
            content_length: Some(a.len() - b.len()),
        };
    }

    if a.len() < b.len() {
        let (prefix, _) = common_affixes(&b, &a);
        return Classification {
            operation: OperationKind::Delete,
            offset: prefix,
            content: None,
            content_length: Some(b.len() - a.len()),
        };
    }

    if a != b {
        let (prefix, suffix) = common_affixes(&b, &a);
        return Classification {
            operation: OperationKind::Format,
            offset: prefix,
            content: None,
            content_length: Some(b.len() - prefix - suffix),
        };
    }

    Classification {
        operation: OperationKind::Unknown,
        offset: 0,
        content: None,
        content_length: None,
    }
}

/// Lengths of the common prefix and suffix; they never overlap in
/// either input.
fn common_affixes(b: &[char], a: &[char]) -> (usize, usize) {
    let prefix = b.iter().zip(a.iter()).take_while(|(x, y)| x == y).count();
    let max_suffix = (b.len() - prefix).min(a.len() - prefix);
    let suffix = b
        .iter()
        .rev()
        .zip(a.iter().rev())
        .take(max_suffix)
        .take_while(|(x, y)| x == y)
        .count();
    (prefix, suffix)
}
