//! Phone number extraction and canonicalization.
//!
//! South African numbers are the canonical form: "+27" followed by nine
//! digits. Local numbers written with a leading "0" and international ones
//! with the "27" country code are treated as the same line.

use std::sync::OnceLock;

use regex::Regex;

/// ZA country code, digits only.
pub const COUNTRY_CODE: &str = "27";

fn phone_shape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\+?\d[\d\s\-\(\)]{6,16}\d").expect("phone shape regex is valid")
    })
}

/// Phone-shaped substrings of free text, digit-stripped. Short digit runs
/// (under 7 digits) are not phones and are skipped.
pub fn extract_digit_runs(text: &str) -> Vec<String> {
    phone_shape()
        .find_iter(text)
        .map(|m| strip_formatting(m.as_str()))
        .filter(|digits| digits.len() >= 7)
        .collect()
}

/// Keep digits only.
pub fn strip_formatting(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Canonical "+27…" display form, when the digits look like a ZA number.
pub fn canonicalize(phone: &str) -> Option<String> {
    let digits = strip_formatting(phone);
    if digits.len() == 10 && digits.starts_with('0') {
        return Some(format!("+{}{}", COUNTRY_CODE, &digits[1..]));
    }
    if digits.len() == 11 && digits.starts_with(COUNTRY_CODE) {
        return Some(format!("+{digits}"));
    }
    None
}

/// Exact digit equality after formatting is stripped.
pub fn digits_equal(a: &str, b: &str) -> bool {
    let a = strip_formatting(a);
    let b = strip_formatting(b);
    !a.is_empty() && a == b
}

/// Format-invariant equivalence: last-10-digit suffix match, or a local
/// leading-"0" form against the same line in international "27" form.
pub fn fuzzy_equal(a: &str, b: &str) -> bool {
    let a = strip_formatting(a);
    let b = strip_formatting(b);
    if a.len() < 7 || b.len() < 7 {
        return false;
    }

    if a.len() >= 10 && b.len() >= 10 && a[a.len() - 10..] == b[b.len() - 10..] {
        return true;
    }

    subscriber_part(&a)
        .zip(subscriber_part(&b))
        .is_some_and(|(sa, sb)| sa == sb)
}

/// The nine-digit subscriber part of a ZA number, from either written form.
fn subscriber_part(digits: &str) -> Option<&str> {
    if digits.len() == 10 && digits.starts_with('0') {
        return Some(&digits[1..]);
    }
    if digits.len() == 11 && digits.starts_with(COUNTRY_CODE) {
        return Some(&digits[2..]);
    }
    None
}
