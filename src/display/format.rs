//! Human-readable rendering of formula results by `ResultKind`.

use crate::store::ResultKind;

impl ResultKind {
    /// Currency as `$1,234.50` (`-$1,234.50` when negative), percentage as
    /// `12.50%` (the value is already in percent units), plain numbers with up
    /// to four decimals and no trailing zeros.
    pub fn format(&self, value: f64) -> String {
        if !value.is_finite() {
            return value.to_string();
        }
        match self {
            ResultKind::Currency => {
                let sign = if value < 0.0 { "-" } else { "" };
                format!("{}${}", sign, group_thousands(&format!("{:.2}", value.abs())))
            }
            ResultKind::Percentage => format!("{:.2}%", value),
            ResultKind::Number => {
                let fixed = format!("{:.4}", value);
                let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
                match trimmed {
                    "-0" => "0".to_string(),
                    other => other.to_string(),
                }
            }
        }
    }
}

fn group_thousands(fixed: &str) -> String {
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed, ""));
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if frac_part.is_empty() {
        grouped
    } else {
        format!("{}.{}", grouped, frac_part)
    }
}
