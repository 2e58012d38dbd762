/// Format an integer with comma thousands separators (`34000000` -> `34,000,000`).
pub fn grouped(value: u64) -> String {
    group_digits(&value.to_string())
}

/// Format a measure the way `en-US` number formatting does: comma groups,
/// at most three fraction digits, trailing zeros dropped.
pub fn grouped_decimal(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let rounded = format!("{:.3}", value.abs());
    let (int_part, frac_part) = rounded
        .split_once('.')
        .unwrap_or((rounded.as_str(), ""));
    let frac = frac_part.trim_end_matches('0');

    let mut out = String::with_capacity(rounded.len() + 4);
    if value < 0.0 && (int_part != "0" || !frac.is_empty()) {
        out.push('-');
    }
    out.push_str(&group_digits(int_part));
    if !frac.is_empty() {
        out.push('.');
        out.push_str(frac);
    }
    out
}

fn group_digits(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (len - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouped_integers() {
        assert_eq!(grouped(0), "0");
        assert_eq!(grouped(999), "999");
        assert_eq!(grouped(1000), "1,000");
        assert_eq!(grouped(34_000_000), "34,000,000");
        assert_eq!(grouped(1_402_112_000), "1,402,112,000");
    }

    #[test]
    fn test_grouped_decimal_whole_numbers() {
        assert_eq!(grouped_decimal(447_400.0), "447,400");
        assert_eq!(grouped_decimal(17_098_242.0), "17,098,242");
        assert_eq!(grouped_decimal(0.0), "0");
    }

    #[test]
    fn test_grouped_decimal_fractions() {
        // Vatican City
        assert_eq!(grouped_decimal(0.44), "0.44");
        assert_eq!(grouped_decimal(1234.5), "1,234.5");
        // Rounded to three fraction digits
        assert_eq!(grouped_decimal(2.0006), "2.001");
        assert_eq!(grouped_decimal(10.0001), "10");
    }

    #[test]
    fn test_grouped_decimal_negative() {
        assert_eq!(grouped_decimal(-1.0), "-1");
        assert_eq!(grouped_decimal(-12_345.25), "-12,345.25");
        assert_eq!(grouped_decimal(-0.0001), "0");
    }
}
