//! Display formatting for metric values, dates and 13F amounts.

use chrono::NaiveDate;

const SI_SUFFIXES: [&str; 5] = ["", "k", "M", "B", "T"];

/// Three-significant-digit SI formatting. Billions use `B`, not giga.
fn si_format(value: f64, significant: i32) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{:.*}", (significant - 1) as usize, 0.0);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    let abs = value.abs();

    let mut exponent = abs.log10().floor() as i32;
    let step = 10f64.powi(exponent - significant + 1);
    let rounded = (abs / step).round() * step;
    if rounded >= 10f64.powi(exponent + 1) {
        exponent += 1;
    }

    let tier = exponent.div_euclid(3).clamp(0, SI_SUFFIXES.len() as i32 - 1);
    let scaled = rounded / 10f64.powi(tier * 3);
    let integer_digits = exponent - tier * 3 + 1;
    let decimals = (significant - integer_digits).max(0) as usize;
    format!("{sign}{scaled:.decimals$}{}", SI_SUFFIXES[tier as usize])
}

/// Share counts: `1.23B`, `456M`.
pub fn format_shares(value: f64) -> String {
    si_format(value, 3)
}

/// Dollar amounts. Small magnitudes are most likely per-share values, so they keep
/// two decimals; everything else gets three significant digits.
pub fn format_millions(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    if value > -100.0 && value < 100.0 {
        format!("{sign}${:.2}", value.abs())
    } else {
        format!("{sign}${}", si_format(value.abs(), 3))
    }
}

/// Picks share or currency formatting from the metric tag.
pub fn format_metric_value(tag: &str, value: f64) -> String {
    if tag.contains("Shares") {
        format_shares(value)
    } else {
        format_millions(value)
    }
}

/// `Mar 31, 2020`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

/// `Mar 31`
pub fn format_short_date(date: NaiveDate) -> String {
    date.format("%b %-d").to_string()
}

fn group_thousands(value: f64) -> String {
    let digits = format!("{:.0}", value.abs().round());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Whole dollars with separators: `$1,234,567`.
pub fn format_whole_currency(value: f64) -> String {
    let sign = if value.round() < 0.0 { "-" } else { "" };
    format!("{sign}${}", group_thousands(value))
}

/// Whole numbers with separators: `-12,500`.
pub fn format_whole_number(value: f64) -> String {
    let sign = if value.round() < 0.0 { "-" } else { "" };
    format!("{sign}{}", group_thousands(value))
}
