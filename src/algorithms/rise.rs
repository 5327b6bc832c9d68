// src/algorithms/rise.rs

use crate::algorithms::cache::{MaskCache, MaskKey};
use crate::algorithms::maskers::generate_masks;
use crate::algorithms::masking::mask_data;
use crate::core::{
    check_probability, InputShape, Instance, MaskBatch, MaskConfig, Result, SaliencyError,
    Saliency,
};
use crate::traits::PredictModel;
use ndarray::{Array2, ArrayD, Axis, IxDyn};
use parking_lot::Mutex;

/// Masks and the perturbed inputs built from them, row for row.
#[derive(Debug, Clone)]
pub struct Perturbation {
    pub masks: MaskBatch,
    /// `[number_of_masks, *input_shape]`
    pub perturbed: ArrayD<f64>,
}

/// Randomized Input Sampling for Explanation.
///
/// Queries the model on randomly occluded copies of an instance and
/// weights every mask by the score it produced. Cells whose occlusion hurts
/// a class score end up with low relevance for that class.
#[derive(Debug)]
pub struct RiseExplainer<M: PredictModel> {
    model: M,
    config: MaskConfig,
    cache: Option<Mutex<MaskCache>>,
}

impl<M: PredictModel> RiseExplainer<M> {
    pub fn new(model: M, config: Option<MaskConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();
        check_probability(config.p_keep)?;
        if config.number_of_masks == 0 {
            return Err(SaliencyError::InvalidInput(
                "At least one mask must be requested.".to_string(),
            ));
        }
        Ok(RiseExplainer {
            model,
            config,
            cache: None,
        })
    }

    /// Keeps up to `capacity` seeded mask batches for repeated requests.
    pub fn with_cache(mut self, capacity: usize) -> Self {
        self.cache = Some(Mutex::new(MaskCache::new(capacity)));
        self
    }

    pub fn config(&self) -> &MaskConfig {
        &self.config
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Cache `(hits, misses)`, if caching is enabled.
    pub fn cache_stats(&self) -> Option<(u64, u64)> {
        self.cache.as_ref().map(|cache| {
            let cache = cache.lock();
            (cache.hits(), cache.misses())
        })
    }

    /// The mask batch this explainer uses for inputs of `shape`.
    pub fn masks(&self, shape: &InputShape) -> Result<MaskBatch> {
        self.config.validate(shape)?;
        if let (Some(cache), Some(key)) = (&self.cache, MaskKey::new(shape, &self.config)) {
            let mut cache = cache.lock();
            return cache.get_or_try_insert_with(key, || self.sample_masks(shape));
        }
        self.sample_masks(shape)
    }

    fn sample_masks(&self, shape: &InputShape) -> Result<MaskBatch> {
        let seed = self.config.resolved_seed();
        let mut rng = seed.to_rng();
        let masks = MaskBatch::Boolean(generate_masks(
            shape,
            self.config.number_of_masks,
            self.config.feature_res,
            self.config.p_keep,
            &mut rng,
        )?);
        tracing::debug!(
            seed = seed.value(),
            keep_fraction = masks.keep_fraction(),
            "sampled mask batch"
        );
        Ok(if self.config.keep_first_identity {
            masks.with_identity_first()
        } else {
            masks
        })
    }

    /// Masks plus the perturbed batch for `instance`, without querying the model.
    pub fn perturb(&self, instance: &Instance) -> Result<Perturbation> {
        let shape = InputShape::of(instance)?;
        let masks = self.masks(&shape)?;
        let perturbed = mask_data(instance, &masks, self.config.fill_policy)?;
        Ok(Perturbation { masks, perturbed })
    }

    pub fn explain(&self, instance: &Instance) -> Result<Saliency> {
        let Perturbation { masks, perturbed } = self.perturb(instance)?;
        let predictions = self.model.predict(&perturbed)?;
        let values = aggregate(&masks, &predictions, self.config.p_keep)?;
        tracing::debug!(classes = predictions.ncols(), "aggregated saliency");
        Ok(Saliency {
            values,
            number_of_masks: masks.len(),
            p_keep: self.config.p_keep,
            masks: self.config.keep_masks.then_some(masks),
            predictions: self.config.keep_predictions.then_some(predictions),
        })
    }
}

/// Weighted average of masks by class score, normalised by the expected
/// keep fraction: `sum_i pred[i, c] * mask_i / (n * p_keep)`.
///
/// `predictions` must hold one row per mask.
pub fn aggregate(masks: &MaskBatch, predictions: &Array2<f64>, p_keep: f64) -> Result<ArrayD<f64>> {
    let number_of_masks = masks.len();
    if predictions.nrows() != number_of_masks {
        return Err(SaliencyError::ModelPredictionError(format!(
            "Model returned {} predictions for {} perturbed inputs.",
            predictions.nrows(),
            number_of_masks
        )));
    }
    let mask_shape = masks.mask_shape().to_vec();
    let cells: usize = mask_shape.iter().product();
    let weights = masks
        .to_weights()
        .as_standard_layout()
        .into_owned()
        .into_shape((number_of_masks, cells))?;

    let saliency = predictions.t().dot(&weights) / (number_of_masks as f64 * p_keep);

    let mut shape = Vec::with_capacity(mask_shape.len() + 1);
    shape.push(predictions.ncols());
    shape.extend_from_slice(&mask_shape);
    Ok(saliency.into_shape(IxDyn(&shape))?)
}

impl Perturbation {
    /// Rows whose mask keeps every cell.
    pub fn identity_rows(&self) -> Vec<usize> {
        let weights = self.masks.to_weights();
        weights
            .axis_iter(Axis(0))
            .enumerate()
            .filter(|(_, mask)| mask.iter().all(|&w| w >= 1.0))
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FillPolicy;
    use ndarray::Array;

    /// Scores each row by the value of a single time step.
    struct StepModel {
        step: usize,
    }

    impl PredictModel for StepModel {
        fn predict(&self, batch: &ArrayD<f64>) -> Result<Array2<f64>> {
            let n = batch.shape()[0];
            let mut out = Array2::zeros((n, 2));
            for (i, row) in batch.outer_iter().enumerate() {
                let score = row[[self.step, 0]];
                out[[i, 0]] = score;
                out[[i, 1]] = 1.0 - score;
            }
            Ok(out)
        }
    }

    fn spike(num_steps: usize, at: usize) -> Instance {
        Array::from_shape_fn((num_steps, 1), |(t, _)| if t == at { 1.0 } else { 0.0 }).into_dyn()
    }

    #[test]
    fn rejects_invalid_probability() {
        let config = MaskConfig::default().with_p_keep(1.5);
        assert!(matches!(
            RiseExplainer::new(StepModel { step: 0 }, Some(config)),
            Err(SaliencyError::InvalidProbability(_))
        ));
    }

    #[test]
    fn finds_the_important_step() {
        let config = MaskConfig::default()
            .with_number_of_masks(400)
            .with_feature_res(10)
            .with_fill_policy(FillPolicy::Zero)
            .with_seed(3);
        let explainer = RiseExplainer::new(StepModel { step: 4 }, Some(config)).unwrap();
        let saliency = explainer.explain(&spike(10, 4)).unwrap();
        assert_eq!(saliency.values.shape(), &[2, 10, 1]);

        let class0 = saliency.class_map(0).unwrap();
        let best = class0
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
        assert_eq!(best.0, 4);
    }

    #[test]
    fn identity_first_row_is_unperturbed() {
        let config = MaskConfig::default()
            .with_number_of_masks(5)
            .with_feature_res(5)
            .with_seed(9)
            .with_identity_first(true);
        let explainer = RiseExplainer::new(StepModel { step: 0 }, Some(config)).unwrap();
        let instance = spike(10, 2);
        let perturbation = explainer.perturb(&instance).unwrap();
        assert_eq!(perturbation.perturbed.index_axis(Axis(0), 0), instance.view());
        assert_eq!(perturbation.identity_rows()[0], 0);
    }

    #[test]
    fn prediction_count_mismatch_is_reported() {
        let model = |_: &ArrayD<f64>| -> Result<Array2<f64>> { Ok(Array2::zeros((1, 2))) };
        let config = MaskConfig::default().with_number_of_masks(4).with_feature_res(4).with_seed(1);
        let explainer = RiseExplainer::new(model, Some(config)).unwrap();
        assert!(matches!(
            explainer.explain(&spike(8, 0)),
            Err(SaliencyError::ModelPredictionError(_))
        ));
    }

    #[test]
    fn cached_batches_are_reused() {
        let config = MaskConfig::default().with_number_of_masks(6).with_feature_res(4).with_seed(5);
        let explainer = RiseExplainer::new(StepModel { step: 0 }, Some(config))
            .unwrap()
            .with_cache(2);
        let shape = InputShape::new(vec![8, 1]).unwrap();
        let first = explainer.masks(&shape).unwrap();
        let second = explainer.masks(&shape).unwrap();
        assert_eq!(first, second);
        assert_eq!(explainer.cache_stats(), Some((1, 1)));
    }

    #[test]
    fn masks_and_predictions_kept_on_request() {
        let config = MaskConfig::default()
            .with_number_of_masks(6)
            .with_feature_res(4)
            .with_seed(2)
            .with_keep_masks(true)
            .with_keep_predictions(true);
        let explainer = RiseExplainer::new(StepModel { step: 1 }, Some(config)).unwrap();
        let saliency = explainer.explain(&spike(8, 1)).unwrap();
        let masks = saliency.masks.as_ref().unwrap();
        let predictions = saliency.predictions.as_ref().unwrap();
        assert_eq!(masks.shape(), &[6, 8, 1]);
        assert_eq!(predictions.dim(), (6, 2));
        assert_eq!(aggregate(masks, predictions, 0.5).unwrap(), saliency.values);
    }

    #[test]
    fn masks_and_predictions_dropped_by_default() {
        let config = MaskConfig::default().with_number_of_masks(6).with_feature_res(4).with_seed(2);
        let explainer = RiseExplainer::new(StepModel { step: 1 }, Some(config)).unwrap();
        let saliency = explainer.explain(&spike(8, 1)).unwrap();
        assert!(saliency.masks.is_none());
        assert!(saliency.predictions.is_none());
    }

    #[test]
    fn aggregate_rejects_row_count_mismatch() {
        let masks = MaskBatch::Boolean(ndarray::array![[true, false], [false, true]].into_dyn());
        let predictions = ndarray::array![[1.0], [0.0], [0.5]];
        assert!(matches!(
            aggregate(&masks, &predictions, 0.5),
            Err(SaliencyError::ModelPredictionError(_))
        ));
    }

    #[test]
    fn aggregate_weights_masks_by_score() {
        let masks = MaskBatch::Boolean(
            ndarray::array![[true, false], [false, true]].into_dyn(),
        );
        let predictions = ndarray::array![[1.0], [0.0]];
        let values = aggregate(&masks, &predictions, 0.5).unwrap();
        assert_eq!(values.shape(), &[1, 2]);
        assert_eq!(values[[0, 0]], 1.0);
        assert_eq!(values[[0, 1]], 0.0);
    }
}
