// src/utils.rs
use std::cmp::Ordering;

/// Indices that sort `values` ascending. Ties keep their original order and
/// NaN sorts last.
pub fn argsort_ascending(values: &[f64]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..values.len()).collect();
    indices.sort_by(|&a, &b| total_cmp(values[a], values[b]));
    indices
}

/// Indices that sort `values` descending, stable on ties.
pub fn argsort_descending(values: &[f64]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..values.len()).collect();
    indices.sort_by(|&a, &b| total_cmp(values[b], values[a]));
    indices
}

fn total_cmp(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or_else(|| b.is_nan().cmp(&a.is_nan()).reverse())
}
