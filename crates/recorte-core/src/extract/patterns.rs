//! Regex tables for receipt field extraction.
//!
//! Both families are ordered from the strictest label match down to the
//! bare digit runs that still rescue a value when OCR mangled the label.
//! Precedence is part of the contract and covered by matcher tests.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Document-id family. OCR frequently drops leading glyphs of
    // "Documento", hence the truncated label variants. The optional
    // "-dd" check-digit suffix is kept when attached to a labeled run.
    pub static ref DOC_LABELED: Regex = Regex::new(
        r"(?i)Documento[:\s]*(\d{8,15}(?:-\d{2})?)"
    ).unwrap();

    pub static ref DOC_LABEL_CLIPPED: Regex = Regex::new(
        r"(?i)ocumento[:\s]*(\d{8,15}(?:-\d{2})?)"
    ).unwrap();

    pub static ref DOC_LABEL_SHORT: Regex = Regex::new(
        r"(?i)umento[:\s]*(\d{8,15}(?:-\d{2})?)"
    ).unwrap();

    pub static ref DOC_PREFIX: Regex = Regex::new(
        r"(?i)Doc[a-z]*[:\s]*(\d{8,15}(?:-\d{2})?)"
    ).unwrap();

    pub static ref DOC_BARE_LONG: Regex = Regex::new(
        r"(\d{10,15})"
    ).unwrap();

    pub static ref DOC_BARE_SHORT: Regex = Regex::new(
        r"(\d{8,9})"
    ).unwrap();

    // NET-total family. Spaced variants absorb the stray blanks OCR
    // inserts between digit groups ("16, 220, 167 . 00").
    pub static ref NET_LABELED_SPACED: Regex = Regex::new(
        r"(?i)NET[O0]?\s*\$?\s*([0-9]{1,3}[\s,.]*[0-9]{3}[\s,.]*[0-9]{3}[\s.]*[0-9]{2})"
    ).unwrap();

    pub static ref NET_LABELED: Regex = Regex::new(
        r"(?i)NETO\s*\$?\s*([0-9]{1,3}(?:[\s]?[,.][\s]?[0-9]{3})*[\s]?[,.][\s]?[0-9]{2})"
    ).unwrap();

    pub static ref TOTALS_LABELED: Regex = Regex::new(
        r"(?i)(?:SUBTOTAL|IVA|TOTAL|NETO)\s*:\s*\$?\s*([0-9]{1,3}(?:[,.][0-9]{3})*[,.][0-9]{2})"
    ).unwrap();

    pub static ref NET_LABEL_DROPOUT: Regex = Regex::new(
        r"(?i)NET[O0]?\s*\$?\s*([0-9]{1,3}(?:[,.][0-9]{3})*[,.][0-9]{2})"
    ).unwrap();

    pub static ref NET_BARE_GROUPED: Regex = Regex::new(
        r"([0-9]{2,3}[,.][0-9]{3}[,.][0-9]{3}[,.][0-9]{2})"
    ).unwrap();

    pub static ref NET_BARE_SPACED: Regex = Regex::new(
        r"([0-9]{1,3}[\s,]*[0-9]{3}[\s,]*[0-9]{3}[\s.]*[0-9]{2})"
    ).unwrap();

    pub static ref NET_LABEL_ANYWHERE: Regex = Regex::new(
        r"(?i)NET[O0]?.*?([0-9]{1,3}(?:[,.][0-9]{3})*[,.][0-9]{2})"
    ).unwrap();
}

/// Document-id patterns in precedence order.
pub fn document_id_patterns() -> Vec<&'static Regex> {
    vec![
        &DOC_LABELED,
        &DOC_LABEL_CLIPPED,
        &DOC_LABEL_SHORT,
        &DOC_PREFIX,
        &DOC_BARE_LONG,
        &DOC_BARE_SHORT,
    ]
}

/// NET-total patterns in precedence order.
pub fn net_total_patterns() -> Vec<&'static Regex> {
    vec![
        &NET_LABELED_SPACED,
        &NET_LABELED,
        &TOTALS_LABELED,
        &NET_LABEL_DROPOUT,
        &NET_BARE_GROUPED,
        &NET_BARE_SPACED,
        &NET_LABEL_ANYWHERE,
    ]
}
