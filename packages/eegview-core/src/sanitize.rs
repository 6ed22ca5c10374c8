//! Replacement of non-finite samples.
//!
//! NaN and ±Infinity become 0.0; finite values pass through untouched, so
//! applying any of these functions twice is the same as applying them once.

#[inline]
pub fn sanitize_value(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

pub fn sanitize_in_place(values: &mut [f64]) {
    for v in values.iter_mut() {
        *v = sanitize_value(*v);
    }
}

pub fn sanitize(values: &[f64]) -> Vec<f64> {
    values.iter().map(|&v| sanitize_value(v)).collect()
}

pub fn sanitize_matrix_in_place(matrix: &mut [Vec<f64>]) {
    for row in matrix.iter_mut() {
        sanitize_in_place(row);
    }
}

pub fn sanitize_matrix(matrix: &[Vec<f64>]) -> Vec<Vec<f64>> {
    matrix.iter().map(|row| sanitize(row)).collect()
}
