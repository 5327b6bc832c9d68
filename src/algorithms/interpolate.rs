// src/algorithms/interpolate.rs

//! Projection of coarse grids onto the full input resolution.
//!
//! Two rules live here:
//! - spatial grids are upsampled bilinearly (pixel centres aligned, edges
//!   clamped) to one cell beyond the target and cropped at a shift, as in
//!   RISE;
//! - time-series control points are treated as one period of a cyclic
//!   signal and sampled at `t * G / S + offset`. Because the phase wraps,
//!   moving every time step by one is the same as moving the offset, so no
//!   step is systematically ranked above another.

use crate::core::{Result, SaliencyError};
use ndarray::{Array1, Array2, ArrayD, ArrayView1, ArrayView2, Axis, IxDyn, s};

/// Size of one grid cell after projecting `grid_len` cells onto `target_len`.
pub fn cell_size(grid_len: usize, target_len: usize) -> usize {
    (target_len + grid_len - 1) / grid_len.max(1)
}

/// Source coordinate and blend weight for output index `dst`.
fn source_coordinate(dst: usize, n_in: usize, n_out: usize) -> (usize, usize, f64) {
    if n_in == 1 {
        return (0, 0, 0.0);
    }
    let scale = n_in as f64 / n_out as f64;
    let src = ((dst as f64 + 0.5) * scale - 0.5).clamp(0.0, (n_in - 1) as f64);
    let lo = (src.floor() as usize).min(n_in - 2);
    (lo, lo + 1, src - lo as f64)
}

/// Bilinear resize of a 2-D grid to `(out_h, out_w)`.
pub fn upscale_bilinear(grid: ArrayView2<f64>, out_h: usize, out_w: usize) -> Array2<f64> {
    let (in_h, in_w) = grid.dim();
    let columns: Vec<(usize, usize, f64)> =
        (0..out_w).map(|x| source_coordinate(x, in_w, out_w)).collect();

    let mut out = Array2::zeros((out_h, out_w));
    for (y, mut row) in out.rows_mut().into_iter().enumerate() {
        let (y0, y1, fy) = source_coordinate(y, in_h, out_h);
        for (x, &(x0, x1, fx)) in columns.iter().enumerate() {
            let top = grid[[y0, x0]] * (1.0 - fx) + grid[[y0, x1]] * fx;
            let bottom = grid[[y1, x0]] * (1.0 - fx) + grid[[y1, x1]] * fx;
            row[x] = top * (1.0 - fy) + bottom * fy;
        }
    }
    out
}

/// Upsamples `grid` to one cell beyond `target` along both axes and crops a
/// `target`-sized window starting at `shift`.
///
/// `shift` must lie within one cell, `[0, cell_size)` per axis.
pub fn interpolate_shifted(
    grid: ArrayView2<f64>,
    target: (usize, usize),
    shift: (usize, usize),
) -> Result<Array2<f64>> {
    let (grid_h, grid_w) = grid.dim();
    let cell = (cell_size(grid_h, target.0), cell_size(grid_w, target.1));
    if shift.0 >= cell.0 || shift.1 >= cell.1 {
        return Err(SaliencyError::InvalidInput(format!(
            "Shift {:?} must be smaller than the cell size {:?}.",
            shift, cell
        )));
    }
    let up = upscale_bilinear(grid, (grid_h + 1) * cell.0, (grid_w + 1) * cell.1);
    Ok(up
        .slice(s![shift.0..shift.0 + target.0, shift.1..shift.1 + target.1])
        .to_owned())
}

/// Samples one cyclic control-point sequence at `num_steps` evenly spaced
/// positions, shifted by `offset` control-point spacings.
pub fn project_grid(grid: ArrayView1<f64>, num_steps: usize, offset: f64) -> Array1<f64> {
    let points = grid.len();
    if points == 0 {
        return Array1::zeros(num_steps);
    }
    let period = points as f64;
    let spacing = period / num_steps as f64;
    Array1::from_shape_fn(num_steps, |t| {
        let position = (t as f64 * spacing + offset).rem_euclid(period);
        let lo = (position.floor() as usize).min(points - 1);
        let hi = (lo + 1) % points;
        let weight = position - lo as f64;
        grid[lo] * (1.0 - weight) + grid[hi] * weight
    })
}

/// Projects a batch of control-point grids `(n, G)` onto masks of
/// `masks_shape = (n, steps, ...)` with a single phase `offset`.
///
/// Axes after the time axis receive the same value. No randomness is
/// involved, the result depends only on the grids and the offset.
pub fn project_grids_to_masks(
    grids: ArrayView2<f64>,
    masks_shape: &[usize],
    offset: f64,
) -> Result<ArrayD<f64>> {
    let offsets = Array1::from_elem(grids.nrows(), offset);
    project_grids_with_offsets(grids, masks_shape, offsets.view())
}

/// Like [`project_grids_to_masks`] with one phase offset per grid.
pub fn project_grids_with_offsets(
    grids: ArrayView2<f64>,
    masks_shape: &[usize],
    offsets: ArrayView1<f64>,
) -> Result<ArrayD<f64>> {
    if masks_shape.len() < 2 {
        return Err(SaliencyError::ShapeMismatch(format!(
            "Masks shape {:?} needs a batch and a time axis.",
            masks_shape
        )));
    }
    let (number_of_masks, num_steps) = (masks_shape[0], masks_shape[1]);
    if grids.nrows() != number_of_masks || offsets.len() != number_of_masks {
        return Err(SaliencyError::ShapeMismatch(format!(
            "{} grids and {} offsets cannot fill {} masks.",
            grids.nrows(),
            offsets.len(),
            number_of_masks
        )));
    }

    let mut projected = Array2::zeros((number_of_masks, num_steps));
    for ((mut row, grid), &offset) in projected
        .axis_iter_mut(Axis(0))
        .zip(grids.axis_iter(Axis(0)))
        .zip(offsets.iter())
    {
        row.assign(&project_grid(grid, num_steps, offset));
    }

    let mut expanded = vec![number_of_masks, num_steps];
    expanded.resize(masks_shape.len(), 1);
    let projected = projected.into_shape(IxDyn(&expanded))?;
    let broadcast = projected.broadcast(IxDyn(masks_shape)).ok_or_else(|| {
        SaliencyError::ShapeMismatch(format!(
            "Cannot broadcast {:?} to {:?}.",
            expanded, masks_shape
        ))
    })?;
    Ok(broadcast.to_owned())
}
