/////////////////////////////////////////////////////////////////////////////////////////////\
//
// Shared numeric and matrix utilities for the count model and its samplers.
//
// Created on: 24 Jan 2026     Author: Tobias Kragholm
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # Utilities
//!
//! Shared helpers for integer/float conversion, simplex normalization,
//! and working with faer probability matrices.

use faer::Mat;
use num_traits::ToPrimitive;

#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    value.to_f64().unwrap_or(f64::MAX)
}

#[must_use]
pub fn count_to_f64(value: u32) -> f64 {
    f64::from(value)
}

#[must_use]
pub fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

/// Normalize non-negative weights onto the simplex and floor every entry.
///
/// Non-finite or negative weights count as zero. A vector with no usable
/// mass becomes uniform. After flooring the vector is renormalized, so every
/// entry is strictly positive when `floor > 0`.
pub fn normalize_with_floor(values: &mut [f64], floor: f64) {
    if values.is_empty() {
        return;
    }

    for value in values.iter_mut() {
        if !(value.is_finite() && *value > 0.0) {
            *value = 0.0;
        }
    }
    let total = values.iter().sum::<f64>();
    if total > 0.0 && total.is_finite() {
        for value in values.iter_mut() {
            *value /= total;
        }
    } else {
        let uniform = 1.0 / usize_to_f64(values.len());
        values.fill(uniform);
    }

    if floor > 0.0 {
        for value in values.iter_mut() {
            *value = value.max(floor);
        }
        let floored_total = values.iter().sum::<f64>();
        for value in values.iter_mut() {
            *value /= floored_total;
        }
    }
}

#[must_use]
pub fn row_to_vec(matrix: &Mat<f64>, row: usize) -> Vec<f64> {
    (0..matrix.ncols()).map(|col| matrix[(row, col)]).collect()
}

pub fn set_row(matrix: &mut Mat<f64>, row: usize, values: &[f64]) {
    for (col, value) in values.iter().enumerate() {
        matrix[(row, col)] = *value;
    }
}

#[must_use]
pub fn row_sums(matrix: &Mat<f64>) -> Vec<f64> {
    (0..matrix.nrows())
        .map(|row| (0..matrix.ncols()).map(|col| matrix[(row, col)]).sum())
        .collect()
}

#[must_use]
pub fn matrix_is_finite(matrix: &Mat<f64>) -> bool {
    for i in 0..matrix.nrows() {
        for j in 0..matrix.ncols() {
            if !matrix[(i, j)].is_finite() {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn normalize_with_floor_sums_to_one() {
        let mut values = vec![2.0, 0.0, 6.0];
        normalize_with_floor(&mut values, 1.0e-6);
        assert_relative_eq!(values.iter().sum::<f64>(), 1.0, epsilon = 1.0e-12);
        assert!(values[1] > 0.0);
        assert!(values[2] > values[0]);
    }

    #[test]
    fn normalize_with_floor_recovers_from_underflow() {
        let mut values = vec![0.0, f64::NAN, -1.0, 0.0];
        normalize_with_floor(&mut values, 1.0e-12);
        for value in &values {
            assert_relative_eq!(*value, 0.25, epsilon = 1.0e-12);
        }
    }

    #[test]
    fn max_abs_diff_matches_expected_value() {
        let max = max_abs_diff(&[0.0, 1.0, 2.0], &[0.0, 0.0, 10.0]);
        assert_relative_eq!(max, 8.0);
    }

    #[test]
    fn row_helpers_round_trip() {
        let mut matrix = Mat::<f64>::zeros(2, 3);
        set_row(&mut matrix, 1, &[0.2, 0.3, 0.5]);
        assert_eq!(row_to_vec(&matrix, 1), vec![0.2, 0.3, 0.5]);
        let sums = row_sums(&matrix);
        assert_relative_eq!(sums[0], 0.0);
        assert_relative_eq!(sums[1], 1.0, epsilon = 1.0e-12);
    }

    #[test]
    fn matrix_is_finite_detects_nan() {
        let matrix = Mat::from_fn(2, 1, |i, _| if i == 0 { 1.0 } else { f64::NAN });
        assert!(!matrix_is_finite(&matrix));
    }
}
