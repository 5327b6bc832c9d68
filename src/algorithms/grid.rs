// src/algorithms/grid.rs

//! Coarse random grids. Every function here is pure given the random
//! source handed in by the caller.

use crate::core::{check_probability, Result, SaliencyError};
use ndarray::{Array2, ArrayD, IxDyn};
use rand::seq::index::sample;
use rand::Rng;
use rand_distr::{Bernoulli, Distribution, Uniform};

/// Number of cells to drop out of `n` for a requested keep probability.
///
/// The expected count `n * (1 - p_keep)` is rounded up or down at random,
/// weighted by its fractional part, so the keep rate is right on average.
/// For two or more cells the result is clamped to `[1, n - 1]`: at least one
/// cell is always dropped and at least one kept. Over few cells this floor
/// dominates, e.g. `p_keep = 0.99` over 10 time steps keeps 9 of them (0.9).
/// A single cell is dropped with probability `1 - p_keep`.
pub fn determine_number_masked<R: Rng + ?Sized>(p_keep: f64, n: usize, rng: &mut R) -> usize {
    if n < 2 {
        return usize::from(n == 1 && rng.gen::<f64>() >= p_keep);
    }
    let mean = n as f64 * (1.0 - p_keep);
    let floor = mean.floor();
    let fraction = mean - floor;
    let mut count = floor as usize;
    if fraction > 0.0 && rng.gen::<f64>() < fraction {
        count += 1;
    }
    let clamped = count.min(n.saturating_sub(1)).max(1);
    if clamped != count {
        tracing::trace!(requested = count, clamped, n, "number of masked cells clamped");
    }
    clamped
}

/// Draws `count` grids of shape `resolution` whose cells are independently
/// kept with probability `p_keep`. Output shape is `(count, *resolution)`.
pub fn sample_grid<R: Rng + ?Sized>(
    resolution: &[usize],
    p_keep: f64,
    count: usize,
    rng: &mut R,
) -> Result<ArrayD<bool>> {
    check_probability(p_keep)?;
    let bernoulli = Bernoulli::new(p_keep)
        .map_err(|e| SaliencyError::InvalidInput(format!("Bernoulli({}): {}", p_keep, e)))?;

    let mut shape = Vec::with_capacity(resolution.len() + 1);
    shape.push(count);
    shape.extend_from_slice(resolution);
    let cells: usize = shape.iter().product();

    let values: Vec<bool> = (0..cells).map(|_| bernoulli.sample(rng)).collect();
    Ok(ArrayD::from_shape_vec(IxDyn(&shape), values)?)
}

/// Draws `count` rows of whole-channel keep flags over `channels` channels.
///
/// Each row drops exactly [`determine_number_masked`] channels, chosen
/// without replacement. Broadcasting a row across the other axes can never
/// split a channel.
pub fn sample_channel_grid<R: Rng + ?Sized>(
    channels: usize,
    p_keep: f64,
    count: usize,
    rng: &mut R,
) -> Result<Array2<bool>> {
    check_probability(p_keep)?;
    if channels == 0 {
        return Err(SaliencyError::InvalidInput(
            "Channel masks need at least one channel.".to_string(),
        ));
    }
    let mut grid = Array2::from_elem((count, channels), true);
    for mut row in grid.rows_mut() {
        let dropped = determine_number_masked(p_keep, channels, rng);
        for channel in sample(rng, channels, dropped) {
            row[channel] = false;
        }
    }
    Ok(grid)
}

/// Draws `count` rows of `resolution` control points uniform in `[0, 1)`.
pub fn sample_uniform_grid<R: Rng + ?Sized>(
    resolution: usize,
    count: usize,
    rng: &mut R,
) -> Array2<f64> {
    let uniform = Uniform::new(0.0, 1.0);
    Array2::from_shape_simple_fn((count, resolution), || uniform.sample(rng))
}
