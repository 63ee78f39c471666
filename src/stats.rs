//! Descriptive statistics and two-sample tests over cohort share distributions.
//!
//! Every statistic that is undefined for the given sample size is `None`
//! rather than NaN, so nothing undefined reaches sorting or output tables.

use std::cmp::Ordering;

use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

use crate::constants::stats::MANN_WHITNEY_EXACT_MAX;
use crate::utils::round2;

/// Summary of one sample.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Descriptives {
    /// Number of values.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: Option<f64>,
    /// Median.
    pub median: Option<f64>,
    /// Smallest most-frequent value after rounding to two decimals.
    pub mode: Option<f64>,
    /// Sample standard deviation (n - 1).
    pub std_dev: Option<f64>,
    /// Smallest value.
    pub min: Option<f64>,
    /// Largest value.
    pub max: Option<f64>,
}

impl Descriptives {
    /// Describe `values`.
    pub fn of(values: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Self {
            count: values.len(),
            mean: mean(values),
            median: median_of_sorted(&sorted),
            mode: mode(values),
            std_dev: sample_std(values),
            min: sorted.first().copied(),
            max: sorted.last().copied(),
        }
    }
}

/// Arithmetic mean; `None` when empty.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median; `None` when empty.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    median_of_sorted(&sorted)
}

fn median_of_sorted(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    if n % 2 == 1 {
        Some(sorted[n / 2])
    } else {
        Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    }
}

/// Smallest most-frequent value, compared at two-decimal precision.
pub fn mode(values: &[f64]) -> Option<f64> {
    let mut rounded: Vec<f64> = values.iter().copied().map(round2).collect();
    rounded.sort_by(f64::total_cmp);
    let mut best: Option<(f64, usize)> = None;
    let mut idx = 0;
    while idx < rounded.len() {
        let value = rounded[idx];
        let run = rounded[idx..]
            .iter()
            .take_while(|other| other.total_cmp(&value) == Ordering::Equal)
            .count();
        if best.is_none_or(|(_, count)| run > count) {
            best = Some((value, run));
        }
        idx += run;
    }
    best.map(|(value, _)| value)
}

fn variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let center = mean(values)?;
    let squares: f64 = values.iter().map(|value| (value - center).powi(2)).sum();
    Some(squares / (values.len() - 1) as f64)
}

/// Sample standard deviation; needs at least two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    variance(values).map(f64::sqrt)
}

/// Statistic and two-sided p-value of a test. Either may be undefined.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TestOutcome {
    /// Test statistic.
    pub statistic: Option<f64>,
    /// Two-sided p-value.
    pub p_value: Option<f64>,
}

/// Student t-test with pooled variance, `first` minus `second`.
pub fn t_test(first: &[f64], second: &[f64]) -> TestOutcome {
    let (n1, n2) = (first.len(), second.len());
    let (Some(m1), Some(m2)) = (mean(first), mean(second)) else {
        return TestOutcome::default();
    };
    if n1 + n2 < 3 {
        return TestOutcome::default();
    }
    let ss1 = variance(first).unwrap_or(0.0) * n1.saturating_sub(1) as f64;
    let ss2 = variance(second).unwrap_or(0.0) * n2.saturating_sub(1) as f64;
    let df = (n1 + n2 - 2) as f64;
    let pooled = (ss1 + ss2) / df;
    let standard_error = (pooled * (1.0 / n1 as f64 + 1.0 / n2 as f64)).sqrt();
    if standard_error == 0.0 {
        return TestOutcome::default();
    }
    let t = (m1 - m2) / standard_error;
    let p_value = StudentsT::new(0.0, 1.0, df)
        .ok()
        .map(|dist| (2.0 * dist.sf(t.abs())).min(1.0));
    TestOutcome {
        statistic: Some(t),
        p_value,
    }
}

/// Two-sided Mann-Whitney U test. The statistic is U of `first`.
///
/// Uses the exact null distribution when the smaller sample has at most
/// `MANN_WHITNEY_EXACT_MAX` values and there are no ties; otherwise the normal
/// approximation with tie and continuity correction.
pub fn mann_whitney(first: &[f64], second: &[f64]) -> TestOutcome {
    let (n1, n2) = (first.len(), second.len());
    if n1 == 0 || n2 == 0 {
        return TestOutcome::default();
    }
    let ranked = rank_with_ties(first, second);
    let rank_sum: f64 = ranked.ranks[..n1].iter().sum();
    let u1 = rank_sum - (n1 * (n1 + 1)) as f64 / 2.0;
    let u2 = (n1 * n2) as f64 - u1;
    let u_max = u1.max(u2);

    let p_value = if n1.min(n2) <= MANN_WHITNEY_EXACT_MAX && ranked.tie_groups.is_empty() {
        Some(exact_two_sided(n1, n2, u_max))
    } else {
        asymptotic_two_sided(n1, n2, u_max, &ranked.tie_groups)
    };
    TestOutcome {
        statistic: Some(u1),
        p_value,
    }
}

struct Ranked {
    /// Ranks of `first` followed by ranks of `second`.
    ranks: Vec<f64>,
    /// Sizes of tie groups larger than one.
    tie_groups: Vec<usize>,
}

fn rank_with_ties(first: &[f64], second: &[f64]) -> Ranked {
    let combined: Vec<f64> = first.iter().chain(second).copied().collect();
    let mut order: Vec<usize> = (0..combined.len()).collect();
    order.sort_by(|a, b| combined[*a].total_cmp(&combined[*b]));

    let mut ranks = vec![0.0; combined.len()];
    let mut tie_groups = Vec::new();
    let mut start = 0;
    while start < order.len() {
        let value = combined[order[start]];
        let end = start
            + order[start..]
                .iter()
                .take_while(|idx| combined[**idx].total_cmp(&value) == Ordering::Equal)
                .count();
        let average = (start + 1 + end) as f64 / 2.0;
        for idx in &order[start..end] {
            ranks[*idx] = average;
        }
        if end - start > 1 {
            tie_groups.push(end - start);
        }
        start = end;
    }
    Ranked { ranks, tie_groups }
}

/// Frequencies of U = 0..=m*n under the null, for samples of size `m` and `n`.
///
/// These are the coefficients of the Gaussian binomial `[m + n choose m]_q`,
/// built one factor `(1 - q^(n+i)) / (1 - q^i)` at a time.
fn u_frequencies(m: usize, n: usize) -> Vec<i128> {
    let (m, n) = if m <= n { (m, n) } else { (n, m) };
    let len = m * n + m + n + 1;
    let mut coefficients = vec![0i128; len];
    coefficients[0] = 1;
    for i in 1..=m {
        let shift = n + i;
        for k in (shift..len).rev() {
            coefficients[k] -= coefficients[k - shift];
        }
        for k in i..len {
            coefficients[k] += coefficients[k - i];
        }
    }
    coefficients.truncate(m * n + 1);
    coefficients
}

fn exact_two_sided(n1: usize, n2: usize, u_max: f64) -> f64 {
    let frequencies = u_frequencies(n1, n2);
    let total: i128 = frequencies.iter().sum();
    let threshold = u_max.round() as usize;
    let upper_tail: i128 = frequencies.iter().skip(threshold).sum();
    (2.0 * upper_tail as f64 / total as f64).min(1.0)
}

fn asymptotic_two_sided(n1: usize, n2: usize, u_max: f64, tie_groups: &[usize]) -> Option<f64> {
    let n = (n1 + n2) as f64;
    let product = (n1 * n2) as f64;
    let tie_term: f64 = tie_groups
        .iter()
        .map(|t| {
            let t = *t as f64;
            t * t * t - t
        })
        .sum();
    let variance = product / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));
    if variance <= 0.0 {
        return None;
    }
    let z = (u_max - product / 2.0 - 0.5) / variance.sqrt();
    let normal = Normal::new(0.0, 1.0).ok()?;
    Some((2.0 * normal.sf(z)).min(1.0))
}

/// Cohen's d of `first` minus `second` with pooled std `sqrt((s1² + s2²) / 2)`.
///
/// `Some(0.0)` when the pooled std is zero; `None` when either std is undefined.
pub fn cohens_d(first: &[f64], second: &[f64]) -> Option<f64> {
    let (s1, s2) = (sample_std(first)?, sample_std(second)?);
    let diff = mean(first)? - mean(second)?;
    let pooled = ((s1 * s1 + s2 * s2) / 2.0).sqrt();
    if pooled > 0.0 {
        Some(diff / pooled)
    } else {
        Some(0.0)
    }
}

/// Conventional magnitude label for an effect size.
pub fn effect_size_label(d: f64) -> &'static str {
    match d.abs() {
        x if x < 0.2 => "negligible",
        x if x < 0.5 => "small",
        x if x < 0.8 => "medium",
        _ => "large",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(actual: Option<f64>, expected: f64, tolerance: f64) -> bool {
        actual.is_some_and(|value| (value - expected).abs() < tolerance)
    }

    #[test]
    fn descriptives_of_small_sample() {
        let stats = Descriptives::of(&[1.0, 2.0, 2.0, 3.0, 7.0]);
        assert_eq!(stats.count, 5);
        assert!(close(stats.mean, 3.0, 1e-12));
        assert_eq!(stats.median, Some(2.0));
        assert_eq!(stats.mode, Some(2.0));
        assert!(close(stats.std_dev, 2.345_207_879_911_715, 1e-9));
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.max, Some(7.0));
    }

    #[test]
    fn undefined_statistics_are_none() {
        let empty = Descriptives::of(&[]);
        assert_eq!(empty.count, 0);
        assert_eq!(empty.mean, None);
        assert_eq!(empty.median, None);
        assert_eq!(empty.mode, None);
        assert_eq!(empty.std_dev, None);
        let single = Descriptives::of(&[4.0]);
        assert_eq!(single.mean, Some(4.0));
        assert_eq!(single.std_dev, None);
    }

    #[test]
    fn mode_prefers_smallest_on_ties_and_even_median_averages() {
        assert_eq!(mode(&[3.0, 1.0, 3.0, 1.0, 2.0]), Some(1.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn t_test_matches_reference_values() {
        let upper = [1.0, 2.0, 3.0, 4.0, 5.0];
        let lower = [2.0, 3.0, 4.0, 5.0, 6.0];
        let outcome = t_test(&upper, &lower);
        assert!(close(outcome.statistic, -1.0, 1e-12));
        assert!(close(outcome.p_value, 0.346_593_507, 1e-6));
    }

    #[test]
    fn t_test_with_zero_variance_is_undefined() {
        let outcome = t_test(&[1.0, 1.0], &[1.0, 1.0]);
        assert_eq!(outcome, TestOutcome::default());
    }

    #[test]
    fn u_frequencies_match_binomial_totals() {
        let frequencies = u_frequencies(3, 4);
        assert_eq!(frequencies.len(), 13);
        assert_eq!(frequencies.iter().sum::<i128>(), 35);
        assert_eq!(frequencies, vec![1, 1, 2, 3, 4, 4, 5, 4, 4, 3, 2, 1, 1]);
    }

    #[test]
    fn mann_whitney_exact_for_small_samples() {
        let outcome = mann_whitney(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]);
        assert_eq!(outcome.statistic, Some(0.0));
        assert!(close(outcome.p_value, 0.1, 1e-12));
    }

    #[test]
    fn mann_whitney_uses_normal_approximation_with_ties() {
        let first = [1.0, 2.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let second = [2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0];
        let outcome = mann_whitney(&first, &second);
        let u = outcome.statistic.unwrap();
        assert!((u - 32.5).abs() < 1e-9);
        let p = outcome.p_value.unwrap();
        assert!(p > 0.15 && p < 0.25);
    }

    #[test]
    fn cohens_d_uses_average_variance() {
        let d = cohens_d(&[2.0, 4.0, 6.0], &[1.0, 2.0, 3.0]).unwrap();
        let expected = 2.0 / ((4.0_f64 + 1.0) / 2.0).sqrt();
        assert!((d - expected).abs() < 1e-12);
        assert_eq!(cohens_d(&[1.0, 1.0], &[1.0, 1.0]), Some(0.0));
        assert_eq!(cohens_d(&[1.0], &[1.0, 2.0]), None);
        assert_eq!(effect_size_label(d), "large");
        assert_eq!(effect_size_label(-0.1), "negligible");
    }
}
