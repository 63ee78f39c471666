//! Small numeric and formatting helpers shared by the pipeline stages.

use crate::types::Percentage;

/// `numerator / denominator * 100`, defined as `0` when `denominator == 0`.
///
/// Never returns NaN, so results are safe to sort and feed into statistics.
pub fn percentage(numerator: u64, denominator: u64) -> Percentage {
    if denominator == 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64 * 100.0
}

/// Round to two decimals, the precision every output table uses.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Render an integer with thousands separators (`1234567` -> `1,234,567`).
pub fn format_with_commas(value: u64) -> String {
    let raw = value.to_string();
    let mut grouped_reversed = String::with_capacity(raw.len() + (raw.len() / 3));
    for (idx, ch) in raw.chars().rev().enumerate() {
        if idx > 0 && idx % 3 == 0 {
            grouped_reversed.push(',');
        }
        grouped_reversed.push(ch);
    }
    grouped_reversed.chars().rev().collect()
}
