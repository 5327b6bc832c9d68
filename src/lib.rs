// src/lib.rs

//! `saliency_rs` generates the randomized occlusion masks behind
//! perturbation-based explanations (RISE, LIME and KernelSHAP style) for
//! image, time-series and tabular models.
//!
//! The pipeline is a chain of pure functions connected by plain arrays:
//! a coarse grid is sampled, interpolated to the input resolution, turned
//! into a mask batch and applied to the instance. The perturbed batch goes
//! to the model; [`RiseExplainer`] closes the loop by aggregating the scores.
//!
//! ```rust
//! use saliency_rs::{generate_masks, mask_data, FillPolicy, InputShape, MaskBatch, Seed};
//! use ndarray::Array;
//!
//! let series = Array::from_shape_fn((10, 1), |(t, _)| t as f64).into_dyn();
//! let shape = InputShape::of(&series)?;
//! let mut rng = Seed::new(42).to_rng();
//!
//! let masks = MaskBatch::Boolean(generate_masks(&shape, 5, 5, 0.3, &mut rng)?);
//! let perturbed = mask_data(&series, &masks, FillPolicy::Mean)?;
//! assert_eq!(perturbed.shape(), &[5, 10, 1]);
//! # Ok::<(), saliency_rs::SaliencyError>(())
//! ```

pub mod algorithms;
pub mod core;
pub mod traits;
pub mod utils;

// Re-export key components for easier use by library consumers
pub use crate::algorithms::{
    generate_channel_masks, generate_interpolated_float_masks,
    generate_interpolated_float_masks_for_timeseries, generate_masks, generate_time_step_masks,
    mask_data, project_grids_to_masks, MaskCache, MaskStrategy, RankTable, RiseExplainer,
};
pub use crate::core::{
    FillPolicy, InputShape, Instance, MaskBatch, MaskConfig, Modality, Result, SaliencyError,
    Saliency, Seed,
};
pub use crate::traits::PredictModel;
