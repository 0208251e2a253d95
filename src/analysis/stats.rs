//! Median and population statistics over metric collections.

use chrono::TimeDelta;
use std::cmp::Ordering;

/// Values a median can be taken over.
///
/// `midpoint` is the mean of two values rounded half away from zero to the
/// type's own granularity.
pub trait Midpoint: Copy + PartialOrd {
    fn zero() -> Self;
    fn midpoint(a: Self, b: Self) -> Self;
}

impl Midpoint for i64 {
    fn zero() -> Self {
        0
    }

    fn midpoint(a: Self, b: Self) -> Self {
        let sum = a as i128 + b as i128;
        // integer division truncates toward zero; push halves outward
        let half = sum / 2 + sum % 2;
        half as i64
    }
}

impl Midpoint for f64 {
    fn zero() -> Self {
        0.0
    }

    fn midpoint(a: Self, b: Self) -> Self {
        (a + b) / 2.0
    }
}

impl Midpoint for TimeDelta {
    fn zero() -> Self {
        TimeDelta::zero()
    }

    /// Rounded to whole milliseconds.
    fn midpoint(a: Self, b: Self) -> Self {
        TimeDelta::milliseconds(<i64 as Midpoint>::midpoint(a.num_milliseconds(), b.num_milliseconds()))
    }
}

/// Median of `values`; zero for an empty slice.
pub fn median<T: Midpoint>(values: &[T]) -> T {
    if values.is_empty() {
        return T::zero();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        return sorted[mid];
    }
    let (low, high) = (sorted[mid - 1], sorted[mid]);
    if low == high {
        low
    } else {
        T::midpoint(low, high)
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean squared deviation from the mean, without Bessel's correction.
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean(values);
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

/// Round to `places` decimals, halves away from zero.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd() {
        assert_eq!(median(&[5i64, 1, 3]), 3);
    }

    #[test]
    fn test_median_even_integer_rounds_away_from_zero() {
        assert_eq!(median(&[1i64, 2, 3, 4]), 3);
        assert_eq!(median(&[-4i64, -3, -2, -1]), -3);
    }

    #[test]
    fn test_median_even_float() {
        assert_eq!(median(&[4.0f64, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn test_median_even_equal_middles() {
        assert_eq!(median(&[1i64, 4, 4, 9]), 4);
    }

    #[test]
    fn test_median_empty_is_zero() {
        assert_eq!(median::<i64>(&[]), 0);
        assert_eq!(median::<f64>(&[]), 0.0);
        assert_eq!(median::<TimeDelta>(&[]), TimeDelta::zero());
    }

    #[test]
    fn test_median_duration() {
        let values = [TimeDelta::seconds(10), TimeDelta::milliseconds(3), TimeDelta::seconds(2)];
        assert_eq!(median(&values), TimeDelta::seconds(2));

        let even = [TimeDelta::milliseconds(1), TimeDelta::milliseconds(2)];
        assert_eq!(median(&even), TimeDelta::milliseconds(2));
    }

    #[test]
    fn test_population_variance() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(population_variance(&values), 4.0);
        assert_eq!(population_variance(&values).sqrt(), 2.0);
        assert_eq!(population_variance(&[]), 0.0);
        assert_eq!(population_variance(&[3.0]), 0.0);
    }

    #[test]
    fn test_round_to_two_places() {
        assert_eq!(round_to(1.234, 2), 1.23);
        assert_eq!(round_to(-0.125, 2), -0.13);
        assert_eq!(round_to(0.125, 2), 0.13);
        assert_eq!(round_to(-40.0, 2), -40.0);
    }
}
