use std::sync::LazyLock;

use regex::Regex;

use crate::TelephonyError;

static E164: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[1-9][0-9]{6,14}$").expect("Invalid E.164 regex"));

/// Strip common formatting and check the result is an E.164 number.
pub fn normalize_number(raw: &str) -> Result<String, TelephonyError> {
    let compact: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();
    if E164.is_match(&compact) {
        Ok(compact)
    } else {
        Err(TelephonyError::InvalidNumber(raw.to_string()))
    }
}
