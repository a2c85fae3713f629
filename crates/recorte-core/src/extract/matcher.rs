//! Tolerant field matching over raw OCR text.
//!
//! A [`PatternSet`] runs one regex family in precedence order against
//! whitespace-normalized text and post-validates the capture so garbled
//! OCR output never leaks through as a field value.

use regex::Regex;

use crate::extract::{amount, patterns};
use crate::profile::ProfileKind;

/// Minimum digits an identifier must keep after leading zeros are dropped.
const MIN_ID_DIGITS: usize = 6;

/// One regex family plus its validation rules.
pub struct PatternSet {
    kind: ProfileKind,
    patterns: Vec<&'static Regex>,
}

impl PatternSet {
    /// Document-id family: labeled forms first, bare digit runs last.
    pub fn document_id() -> Self {
        Self {
            kind: ProfileKind::DocumentId,
            patterns: patterns::document_id_patterns(),
        }
    }

    /// NET-total family with the Colombian amount grammar as validator.
    pub fn net_total() -> Self {
        Self {
            kind: ProfileKind::NetTotal,
            patterns: patterns::net_total_patterns(),
        }
    }

    pub fn for_kind(kind: ProfileKind) -> Self {
        match kind {
            ProfileKind::DocumentId => Self::document_id(),
            ProfileKind::NetTotal => Self::net_total(),
        }
    }

    pub fn kind(&self) -> ProfileKind {
        self.kind
    }

    /// Runs the family against `text` and returns the first capture that
    /// survives validation. Earlier patterns win even when a later one
    /// would also match.
    pub fn find(&self, text: &str) -> Option<String> {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return None;
        }
        for pattern in &self.patterns {
            for caps in pattern.captures_iter(&normalized) {
                let raw = caps.get(1)?.as_str();
                let validated = match self.kind {
                    ProfileKind::DocumentId => normalize_identifier(raw),
                    ProfileKind::NetTotal => amount::validate_amount(raw),
                };
                if let Some(value) = validated {
                    return Some(value);
                }
            }
        }
        None
    }
}

/// Collapses runs of whitespace to single spaces so line breaks inside a
/// label ("Docu mento") do not defeat the `[:\s]*` separators.
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drops leading zeros from a captured identifier and enforces the
/// minimum length. A "-dd" check-digit suffix is preserved verbatim.
fn normalize_identifier(raw: &str) -> Option<String> {
    let (digits, suffix) = match raw.split_once('-') {
        Some((head, tail)) => (head, Some(tail)),
        None => (raw, None),
    };
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let trimmed = digits.trim_start_matches('0');
    let trimmed = if trimmed.is_empty() { "0" } else { trimmed };
    if trimmed.len() < MIN_ID_DIGITS {
        return None;
    }
    Some(match suffix {
        Some(tail) => format!("{trimmed}-{tail}"),
        None => trimmed.to_string(),
    })
}
