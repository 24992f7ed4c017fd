//! Best-effort extraction of an Indian mobile number from free text.
//!
//! Rules are tried in order, most specific first, so that digits belonging
//! to order ids or pincodes are not mistaken for a phone number.

use regex::Regex;
use tracing::{debug, warn};

use crate::error::PhoneError;

/// A single extraction rule. Receives the original text and its digits-only
/// projection.
type Matcher = fn(&str, &str) -> Option<String>;

const MATCHERS: [(&str, Matcher); 5] = [
    ("whole_message", whole_message),
    ("whole_message_with_country_code", whole_message_with_country_code),
    ("embedded_country_code", embedded_country_code),
    ("bounded_run", bounded_run),
    ("any_run", any_run),
];

pub fn is_valid_indian_mobile(value: &str) -> bool {
    value.len() == 10
        && value.bytes().all(|b| b.is_ascii_digit())
        && matches!(value.as_bytes()[0], b'6'..=b'9')
}

pub fn extract_phone(text: &str) -> Result<String, PhoneError> {
    if text.trim().is_empty() {
        return Err(PhoneError::Empty);
    }
    let digits = digits_only(text);
    if digits.is_empty() {
        return Err(PhoneError::NotFound);
    }

    MATCHERS
        .iter()
        .find_map(|(rule, matcher)| {
            matcher(text, &digits).map(|phone| {
                debug!(rule, "phone extracted");
                phone
            })
        })
        .filter(|phone| is_valid_indian_mobile(phone))
        .ok_or(PhoneError::NotFound)
}

/// Same as [`extract_phone`] but accepts a missing message.
pub fn extract_phone_opt(text: Option<&str>) -> Result<String, PhoneError> {
    match text {
        Some(text) => extract_phone(text),
        None => Err(PhoneError::Empty),
    }
}

fn digits_only(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn whole_message(_text: &str, digits: &str) -> Option<String> {
    is_valid_indian_mobile(digits).then(|| digits.to_string())
}

fn whole_message_with_country_code(_text: &str, digits: &str) -> Option<String> {
    let re = Regex::new(r"^91([6-9]\d{9})$").ok()?;
    re.captures(digits).map(|caps| caps[1].to_string())
}

/// Country-code number at the tail of the digit stream, i.e. not followed
/// by any further digit.
fn embedded_country_code(_text: &str, digits: &str) -> Option<String> {
    let re = Regex::new(r"91([6-9]\d{9})$").ok()?;
    re.captures(digits).map(|caps| caps[1].to_string())
}

fn bounded_run(text: &str, _digits: &str) -> Option<String> {
    let re = Regex::new(r"(?:^|\D)([6-9]\d{9})(?:\D|$)").ok()?;
    let found = re.captures_iter(text).find_map(|caps| {
        let run = caps.get(1)?;
        let cluster = digit_cluster(text, run.start(), run.end());
        let candidate = run.as_str();
        if cluster == candidate || cluster.strip_prefix("91") == Some(candidate) {
            Some(candidate.to_string())
        } else {
            debug!("bounded run is part of a longer number, skipping");
            None
        }
    });
    found
}

fn any_run(_text: &str, digits: &str) -> Option<String> {
    let re = Regex::new(r"[6-9]\d{9}").ok()?;
    let candidates = re
        .find_iter(digits)
        .map(|m| m.as_str())
        .collect::<Vec<_>>();
    if candidates.len() > 1 {
        warn!(
            candidates = candidates.len(),
            "ambiguous phone input, taking the first candidate"
        );
    }
    candidates.first().map(|c| c.to_string())
}

/// Digits of the number the run at `start..end` belongs to, following
/// phone-style separators (spaces, dashes, dots, brackets, plus) on both
/// sides. "+91 98765-43210" and "9876543210" are clusters on their own,
/// "4561 9876543210" is not.
fn digit_cluster(text: &str, start: usize, end: usize) -> String {
    let is_joiner = |c: char| c.is_ascii_digit() || matches!(c, ' ' | '-' | '.' | '(' | ')' | '+');

    let before = text[..start]
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_joiner(*c))
        .last()
        .map(|(i, _)| i)
        .unwrap_or(start);
    let after = text[end..]
        .char_indices()
        .take_while(|(_, c)| is_joiner(*c))
        .last()
        .map(|(i, c)| end + i + c.len_utf8())
        .unwrap_or(end);

    digits_only(&text[before..after])
}
