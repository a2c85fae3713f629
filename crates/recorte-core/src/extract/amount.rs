//! Monetary amount grammar for Colombian totals.
//!
//! Accepted canonical form: comma-grouped thousands with a two-digit
//! dot decimal, e.g. `16,220,167.00`. OCR candidates are normalized
//! (whitespace stripped, lone-dot groupings re-punctuated) and then
//! must re-validate against the grammar before they are accepted.

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

lazy_static! {
    /// Canonical amount grammar: 1-3 leading digits, comma-separated
    /// thousands groups, dot + two decimals.
    static ref AMOUNT_GRAMMAR: Regex =
        Regex::new(r"^[0-9]{1,3}(?:,[0-9]{3})*\.[0-9]{2}$").unwrap();
}

/// Minimum significant digits for a plausible total; smaller numbers on
/// an invoice footer are line counts, percentages, page numbers.
const MIN_SIGNIFICANT_DIGITS: usize = 6;

/// Normalize an OCR candidate and validate it against the grammar.
/// Returns the canonical rendering, or `None` if the candidate is not a
/// plausible monetary total.
pub fn validate_amount(candidate: &str) -> Option<String> {
    // Strip the whitespace OCR scatters between digit groups.
    let compact: String = candidate.chars().filter(|c| !c.is_whitespace()).collect();

    let canonical = if AMOUNT_GRAMMAR.is_match(&compact) {
        compact
    } else {
        // Re-derive the canonical form from the digits alone: last two
        // digits are decimals, the rest regroups in threes. This rescues
        // dot-grouped and bare-digit candidates.
        let digits: String = compact.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() < 3 {
            return None;
        }
        let (integer, decimals) = digits.split_at(digits.len() - 2);
        let regrouped = group_thousands(integer);
        format!("{regrouped}.{decimals}")
    };

    if !AMOUNT_GRAMMAR.is_match(&canonical) {
        return None;
    }

    let significant: usize = canonical.chars().filter(|c| c.is_ascii_digit()).count();
    if significant < MIN_SIGNIFICANT_DIGITS {
        return None;
    }

    // Round-trip law: the accepted string must parse and re-render
    // identically.
    let value = parse_amount(&canonical)?;
    if format_amount(value) != canonical {
        return None;
    }

    Some(canonical)
}

/// Parse a canonical amount string into a decimal value.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    Decimal::from_str(&s.replace(',', "")).ok()
}

/// Render a decimal back into the canonical comma-grouped form.
pub fn format_amount(amount: Decimal) -> String {
    let s = format!("{:.2}", amount);
    let (integer, decimals) = match s.split_once('.') {
        Some(parts) => parts,
        None => (s.as_str(), "00"),
    };
    format!("{}.{}", group_thousands(integer), decimals)
}

fn group_thousands(integer: &str) -> String {
    let chars: Vec<char> = integer.chars().collect();
    let mut grouped = String::with_capacity(chars.len() + chars.len() / 3);
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn canonical_amount_accepted_verbatim() {
        assert_eq!(
            validate_amount("16,220,167.00").as_deref(),
            Some("16,220,167.00")
        );
    }

    #[test]
    fn spaced_ocr_noise_is_normalized() {
        assert_eq!(
            validate_amount("16, 220, 167 . 00").as_deref(),
            Some("16,220,167.00")
        );
    }

    #[test]
    fn dot_grouped_candidate_is_regrouped() {
        assert_eq!(
            validate_amount("16.220.167.00").as_deref(),
            Some("16,220,167.00")
        );
    }

    #[test]
    fn small_values_rejected() {
        assert_eq!(validate_amount("999.99"), None);
        assert_eq!(validate_amount("23.00"), None);
        // Six significant digits is the floor.
        assert_eq!(validate_amount("1,000.00").as_deref(), Some("1,000.00"));
    }

    #[test]
    fn non_numeric_rejected() {
        assert_eq!(validate_amount("NETO"), None);
        assert_eq!(validate_amount(""), None);
    }

    #[test]
    fn round_trip_law() {
        let canonical = validate_amount("16,220,167.00").unwrap();
        let value = parse_amount(&canonical).unwrap();
        assert_eq!(value, Decimal::from_str("16220167.00").unwrap());
        assert_eq!(format_amount(value), canonical);
    }

    #[test]
    fn format_groups_thousands() {
        assert_eq!(
            format_amount(Decimal::from_str("1234567.89").unwrap()),
            "1,234,567.89"
        );
        assert_eq!(format_amount(Decimal::from_str("999.50").unwrap()), "999.50");
    }
}
