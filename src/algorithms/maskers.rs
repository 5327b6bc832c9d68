// src/algorithms/maskers.rs

use crate::algorithms::grid::{
    determine_number_masked, sample_channel_grid, sample_grid, sample_uniform_grid,
};
use crate::algorithms::interpolate::{cell_size, interpolate_shifted, project_grids_with_offsets};
use crate::core::{check_probability, InputShape, Modality, Result, SaliencyError};
use crate::utils::argsort_ascending;
use ndarray::{concatenate, Array, Array1, Array2, Array3, ArrayD, Axis, Dimension, IxDyn};
use rand::Rng;
use rand_distr::{Distribution, Uniform};

/// Boolean masking strategies, one per kind of occlusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskStrategy {
    /// RISE grid over the spatial axes, thresholded at 0.5.
    Spatial { feature_res: usize },
    /// Exact number of time steps dropped, shared by every channel.
    TimeStep { number_of_features: usize },
    /// Whole channels dropped.
    Channel,
    /// A third time-step masks, a third channel masks, the rest both at once.
    Combined { feature_res: usize },
}

impl MaskStrategy {
    /// The strategy `generate_masks` uses for `shape`.
    pub fn select(shape: &InputShape, feature_res: usize) -> Self {
        match shape.modality() {
            Modality::Image => MaskStrategy::Spatial { feature_res },
            Modality::TimeSeries if shape.channels() > 1 => MaskStrategy::Combined { feature_res },
            Modality::TimeSeries | Modality::Tabular => MaskStrategy::TimeStep {
                number_of_features: feature_res,
            },
        }
    }

    pub fn generate<R: Rng + ?Sized>(
        &self,
        shape: &InputShape,
        number_of_masks: usize,
        p_keep: f64,
        rng: &mut R,
    ) -> Result<ArrayD<bool>> {
        tracing::trace!(strategy = ?self, %shape, number_of_masks, p_keep, "generating masks");
        match *self {
            MaskStrategy::Spatial { feature_res } => {
                check_probability(p_keep)?;
                shape.check_resolution(feature_res)?;
                let (planes, grid_cells) =
                    spatial_planes(shape, p_keep, number_of_masks, feature_res, rng)?;
                let mut keep = planes.mapv(|weight| weight > 0.5);
                if grid_cells >= 2 {
                    mask_lowest_if_all_kept(&mut keep, &planes);
                }
                expand_planes(keep, shape, number_of_masks)
            }
            MaskStrategy::TimeStep { number_of_features } => {
                generate_time_step_masks(shape, number_of_masks, p_keep, number_of_features, rng)
            }
            MaskStrategy::Channel => generate_channel_masks(shape, number_of_masks, p_keep, rng),
            MaskStrategy::Combined { feature_res } => {
                generate_combined_masks(shape, number_of_masks, feature_res, p_keep, rng)
            }
        }
    }
}

/// Boolean masks for any supported input, `(number_of_masks, *shape)`.
pub fn generate_masks<R: Rng + ?Sized>(
    shape: &InputShape,
    number_of_masks: usize,
    feature_res: usize,
    p_keep: f64,
    rng: &mut R,
) -> Result<ArrayD<bool>> {
    check_probability(p_keep)?;
    shape.check_resolution(feature_res)?;
    let strategy = MaskStrategy::select(shape, feature_res);
    tracing::debug!(?strategy, %shape, number_of_masks, p_keep, "mask batch requested");
    strategy.generate(shape, number_of_masks, p_keep, rng)
}

/// Masks dropping whole time steps, identical across channels.
///
/// Float time-series masks are drawn first and, per mask, the
/// [`determine_number_masked`] lowest-weighted steps are dropped. Every mask
/// therefore drops the same count while the rank-uniform projection spreads
/// the dropped steps evenly over the series.
pub fn generate_time_step_masks<R: Rng + ?Sized>(
    shape: &InputShape,
    number_of_masks: usize,
    p_keep: f64,
    number_of_features: usize,
    rng: &mut R,
) -> Result<ArrayD<bool>> {
    check_probability(p_keep)?;
    shape.check_resolution(number_of_features)?;
    let num_steps = shape.time_steps();

    let weights = time_series_weights(num_steps, number_of_masks, number_of_features, rng)?;
    let mut keep = Array2::from_elem((number_of_masks, num_steps), true);
    for (mut keep_row, weight_row) in keep.rows_mut().into_iter().zip(weights.rows()) {
        keep_row.assign(&mask_bottom_ratio(weight_row.to_vec(), p_keep, rng));
    }

    let mut expanded = vec![number_of_masks; shape.ndim() + 1];
    expanded[1] = num_steps;
    expanded[2..].iter_mut().for_each(|d| *d = 1);
    broadcast_to(keep, &expanded, &shape.batch_shape(number_of_masks))
}

/// Masks dropping whole channels. Within one mask every cell of a channel
/// shares the same value.
pub fn generate_channel_masks<R: Rng + ?Sized>(
    shape: &InputShape,
    number_of_masks: usize,
    p_keep: f64,
    rng: &mut R,
) -> Result<ArrayD<bool>> {
    let channels = shape.channels();
    let grid = sample_channel_grid(channels, p_keep, number_of_masks, rng)?;

    let mut expanded = vec![1; shape.ndim() + 1];
    expanded[0] = number_of_masks;
    expanded[shape.ndim()] = channels;
    broadcast_to(grid, &expanded, &shape.batch_shape(number_of_masks))
}

fn generate_combined_masks<R: Rng + ?Sized>(
    shape: &InputShape,
    number_of_masks: usize,
    feature_res: usize,
    p_keep: f64,
    rng: &mut R,
) -> Result<ArrayD<bool>> {
    let number_of_channel_masks = number_of_masks / 3;
    let number_of_time_step_masks = number_of_channel_masks;
    let number_of_combined_masks =
        number_of_masks - number_of_time_step_masks - number_of_channel_masks;

    let time_step_masks =
        generate_time_step_masks(shape, number_of_time_step_masks, p_keep, feature_res, rng)?;
    let channel_masks = generate_channel_masks(shape, number_of_channel_masks, p_keep, rng)?;

    // Both halves of a combined mask keep sqrt(p_keep) so their product keeps p_keep.
    let sqrt_p_keep = p_keep.sqrt();
    let combined_time = generate_time_step_masks(
        shape,
        number_of_combined_masks,
        sqrt_p_keep,
        feature_res,
        rng,
    )?;
    let combined_channel =
        generate_channel_masks(shape, number_of_combined_masks, sqrt_p_keep, rng)?;
    let combined = ndarray::Zip::from(&combined_time)
        .and(&combined_channel)
        .map_collect(|&time, &channel| time && channel);

    Ok(concatenate(
        Axis(0),
        &[time_step_masks.view(), channel_masks.view(), combined.view()],
    )?)
}

/// RISE float masks with mean weight close to `p_keep`.
///
/// A `feature_res` grid of kept/dropped cells is laid over the relevant axes
/// (height and width for images, the leading axis otherwise), upsampled
/// bilinearly to one cell beyond the input and cropped at a random shift.
pub fn generate_interpolated_float_masks<R: Rng + ?Sized>(
    shape: &InputShape,
    p_keep: f64,
    number_of_masks: usize,
    feature_res: usize,
    rng: &mut R,
) -> Result<ArrayD<f64>> {
    check_probability(p_keep)?;
    shape.check_resolution(feature_res)?;
    let (planes, _) = spatial_planes(shape, p_keep, number_of_masks, feature_res, rng)?;
    expand_planes(planes, shape, number_of_masks)
}

/// `(number_of_masks, height, width)` RISE weights plus the number of cells
/// in the coarse grid. Series use a width of one.
fn spatial_planes<R: Rng + ?Sized>(
    shape: &InputShape,
    p_keep: f64,
    number_of_masks: usize,
    feature_res: usize,
    rng: &mut R,
) -> Result<(Array3<f64>, usize)> {
    let dims = shape.dims();
    let (target, grid_res) = match shape.modality() {
        Modality::Image => ((dims[0], dims[1]), [feature_res, feature_res]),
        Modality::TimeSeries | Modality::Tabular => ((dims[0], 1), [feature_res, 1]),
    };
    let cell = (cell_size(grid_res[0], target.0), cell_size(grid_res[1], target.1));

    let grids = sample_grid(&grid_res, p_keep, number_of_masks, rng)?
        .mapv(|keep| if keep { 1.0 } else { 0.0 })
        .into_dimensionality::<ndarray::Ix3>()?;

    let mut planes = Array3::zeros((number_of_masks, target.0, target.1));
    for (mut plane, grid) in planes.outer_iter_mut().zip(grids.outer_iter()) {
        let shift = (rng.gen_range(0..cell.0), rng.gen_range(0..cell.1));
        plane.assign(&interpolate_shifted(grid, target, shift)?);
    }
    Ok((planes, grid_res[0] * grid_res[1]))
}

/// Keeps at least one pixel masked: a mask that thresholded to all-kept
/// loses its lowest-weighted pixel.
fn mask_lowest_if_all_kept(keep: &mut Array3<bool>, planes: &Array3<f64>) {
    for (mut keep_plane, plane) in keep.outer_iter_mut().zip(planes.outer_iter()) {
        if !keep_plane.iter().all(|&k| k) {
            continue;
        }
        let lowest = plane
            .indexed_iter()
            .fold(None, |lowest: Option<((usize, usize), f64)>, (index, &weight)| {
                match lowest {
                    Some((_, w)) if w <= weight => lowest,
                    _ => Some((index, weight)),
                }
            });
        if let Some((index, _)) = lowest {
            keep_plane[index] = false;
        }
    }
}

/// Broadcasts per-mask planes over the remaining axes of `shape`.
fn expand_planes<A: Clone>(
    planes: Array3<A>,
    shape: &InputShape,
    number_of_masks: usize,
) -> Result<ArrayD<A>> {
    let (_, height, width) = planes.dim();
    let expanded: Vec<usize> = match shape.modality() {
        Modality::Image => {
            let mut expanded = vec![number_of_masks, height, width];
            expanded.resize(shape.ndim() + 1, 1);
            expanded
        }
        Modality::TimeSeries => vec![number_of_masks, height, width],
        Modality::Tabular => vec![number_of_masks, height],
    };
    broadcast_to(planes, &expanded, &shape.batch_shape(number_of_masks))
}

/// Continuous time-series masks whose per-step ranks are uniformly
/// distributed.
///
/// Each mask draws `number_of_features` uniform control points and a phase
/// offset in `[0, 1)`, then samples the cyclic interpolation at every time
/// step. `number_of_features` is independent of the number of steps; fewer
/// control points than steps give smoother masks.
pub fn generate_interpolated_float_masks_for_timeseries<R: Rng + ?Sized>(
    shape: &InputShape,
    number_of_masks: usize,
    number_of_features: usize,
    rng: &mut R,
) -> Result<ArrayD<f64>> {
    let num_steps = shape.time_steps();
    let weights = time_series_weights(num_steps, number_of_masks, number_of_features, rng)?;

    let mut expanded = vec![1; shape.ndim() + 1];
    expanded[0] = number_of_masks;
    expanded[1] = num_steps;
    broadcast_to(weights, &expanded, &shape.batch_shape(number_of_masks))
}

/// `(number_of_masks, num_steps)` rank-uniform weights.
fn time_series_weights<R: Rng + ?Sized>(
    num_steps: usize,
    number_of_masks: usize,
    number_of_features: usize,
    rng: &mut R,
) -> Result<Array2<f64>> {
    if number_of_features == 0 {
        return Err(SaliencyError::InvalidInput(
            "Time-series masks need at least one control point.".to_string(),
        ));
    }
    let grids = sample_uniform_grid(number_of_features, number_of_masks, rng);
    let phase = Uniform::new(0.0, 1.0);
    let offsets = Array1::from_shape_simple_fn(number_of_masks, || phase.sample(rng));
    let weights = project_grids_with_offsets(
        grids.view(),
        &[number_of_masks, num_steps],
        offsets.view(),
    )?;
    Ok(weights.into_dimensionality()?)
}

/// Drops the lowest-weighted cells of one float mask, keeping the rest.
fn mask_bottom_ratio<R: Rng + ?Sized>(weights: Vec<f64>, p_keep: f64, rng: &mut R) -> Array1<bool> {
    let masked = determine_number_masked(p_keep, weights.len(), rng);
    let mut keep = Array1::from_elem(weights.len(), true);
    for &index in argsort_ascending(&weights).iter().take(masked) {
        keep[index] = false;
    }
    keep
}

fn broadcast_to<A: Clone, D: Dimension>(
    array: Array<A, D>,
    expanded: &[usize],
    target: &[usize],
) -> Result<ArrayD<A>> {
    let array = array.into_shape(IxDyn(expanded))?;
    let view = array.broadcast(IxDyn(target)).ok_or_else(|| {
        SaliencyError::ShapeMismatch(format!("Cannot broadcast {:?} to {:?}.", expanded, target))
    })?;
    Ok(view.to_owned())
}
