// src/traits.rs
use crate::core::Result;
use ndarray::{Array2, ArrayD};

/// The black-box model being explained.
///
/// `predict` receives a batch shaped `[batch, *input_shape]` exactly as the
/// masking applicator produced it and must return one score vector per row,
/// in the same order: `[batch, classes]`.
pub trait PredictModel {
    fn predict(&self, batch: &ArrayD<f64>) -> Result<Array2<f64>>;
}

impl<F> PredictModel for F
where
    F: Fn(&ArrayD<f64>) -> Result<Array2<f64>>,
{
    fn predict(&self, batch: &ArrayD<f64>) -> Result<Array2<f64>> {
        self(batch)
    }
}
