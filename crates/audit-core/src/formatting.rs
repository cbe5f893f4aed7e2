/// Format a floating-point number with thousands separators and a fixed number
/// of decimal places.
///
/// # Examples
///
/// ```
/// use audit_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5, 1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    if !value.is_finite() {
        return "n/a".to_string();
    }
    let formatted = format!("{:.prec$}", value.abs(), prec = decimals as usize);
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut out = String::new();
    // "-0.00" after rounding is shown as "0.00".
    if value < 0.0 && formatted.chars().any(|c| c.is_ascii_digit() && c != '0') {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part));
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Format a monetary amount as USD with two decimal places.
///
/// ```
/// use audit_core::formatting::format_currency;
///
/// assert_eq!(format_currency(1234.56), "$1,234.56");
/// assert_eq!(format_currency(-9.99), "-$9.99");
/// ```
pub fn format_currency(amount: f64) -> String {
    let body = format_number(amount.abs(), 2);
    if amount < 0.0 && body != "0.00" {
        format!("-${body}")
    } else {
        format!("${body}")
    }
}

/// Storage volume in TB, two decimals.
pub fn format_tb(tb: f64) -> String {
    format!("{} TB", format_number(tb, 2))
}

/// A percentage with one decimal; `None` renders as `n/a`.
pub fn format_pct(pct: Option<f64>) -> String {
    match pct {
        Some(p) if p.is_finite() => format!("{}%", format_number(p, 1)),
        _ => "n/a".to_string(),
    }
}

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    let len = s.len();
    let mut result = String::with_capacity(len + len / 3);
    for (i, c) in s.chars().enumerate() {
        if i != 0 && (len - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────
