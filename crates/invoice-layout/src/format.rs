//! Number parsing and thousands-separator formatting

use serde_json::Value;

/// Maximum fraction digits kept when formatting
const MAX_FRACTION_DIGITS: usize = 3;

/// Parse a finite number from a string; blank strings are not numbers
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Numeric value of a raw record value, if it has one
pub fn value_as_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64().filter(|n| n.is_finite()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Format `text` with comma-grouped thousands if it is numeric.
///
/// Non-numeric text is returned unchanged.
pub fn format_thousands(text: &str) -> String {
    match parse_number(text) {
        Some(n) => format_number(n),
        None => text.to_string(),
    }
}

/// Format a number with comma-grouped thousands and at most three fraction digits
pub fn format_number(n: f64) -> String {
    let fixed = format!("{:.*}", MAX_FRACTION_DIGITS, n.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((int_part, frac)) => (int_part, frac.trim_end_matches('0')),
        None => (fixed.as_str(), ""),
    };

    let mut out = String::with_capacity(fixed.len() + fixed.len() / 3 + 1);
    let is_zero = int_part.bytes().all(|b| b == b'0') && frac_part.is_empty();
    if n.is_sign_negative() && !is_zero {
        out.push('-');
    }
    out.push_str(&group_digits(int_part));
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}

fn group_digits(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_groups_integers() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(999.0), "999");
        assert_eq!(format_number(1000.0), "1,000");
        assert_eq!(format_number(1234567.0), "1,234,567");
        assert_eq!(format_number(-98765.0), "-98,765");
    }

    #[test]
    fn test_keeps_up_to_three_fraction_digits() {
        assert_eq!(format_number(1234.5), "1,234.5");
        assert_eq!(format_number(0.1234), "0.123");
        assert_eq!(format_number(2.0006), "2.001");
        assert_eq!(format_number(-0.0001), "0");
    }

    #[test]
    fn test_format_thousands_passes_through_text() {
        assert_eq!(format_thousands("15000"), "15,000");
        assert_eq!(format_thousands(" 42 "), "42");
        assert_eq!(format_thousands("n/a"), "n/a");
        assert_eq!(format_thousands(""), "");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("12.5"), Some(12.5));
        assert_eq!(parse_number("1e3"), Some(1000.0));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("   "), None);
        assert_eq!(parse_number("1,000"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn test_value_as_number() {
        assert_eq!(value_as_number(Some(&json!(7))), Some(7.0));
        assert_eq!(value_as_number(Some(&json!("7.25"))), Some(7.25));
        assert_eq!(value_as_number(Some(&json!(null))), None);
        assert_eq!(value_as_number(Some(&json!(true))), None);
        assert_eq!(value_as_number(None), None);
    }
}
