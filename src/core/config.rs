// src/core/config.rs
use crate::core::data::{FillPolicy, InputShape};
use crate::core::errors::{check_probability, Result, SaliencyError};
use crate::core::seed::Seed;
use serde::{Deserialize, Serialize};

/// User-facing parameters of one explanation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskConfig {
    pub number_of_masks: usize,
    /// Expected fraction of content left unperturbed.
    pub p_keep: f64,
    /// Coarse grid size along each modality-relevant axis.
    pub feature_res: usize,
    pub fill_policy: FillPolicy,
    /// `None` draws a fresh seed per request.
    pub seed: Option<Seed>,
    /// Force mask 0 to the identity mask.
    pub keep_first_identity: bool,
    /// Return the mask batch alongside the saliency values.
    pub keep_masks: bool,
    /// Return the raw model predictions alongside the saliency values.
    pub keep_predictions: bool,
}

impl Default for MaskConfig {
    fn default() -> Self {
        MaskConfig {
            number_of_masks: 1000,
            p_keep: 0.5,
            feature_res: 8,
            fill_policy: FillPolicy::Mean,
            seed: None,
            keep_first_identity: false,
            keep_masks: false,
            keep_predictions: false,
        }
    }
}

impl MaskConfig {
    pub fn with_number_of_masks(mut self, number_of_masks: usize) -> Self {
        self.number_of_masks = number_of_masks;
        self
    }

    pub fn with_p_keep(mut self, p_keep: f64) -> Self {
        self.p_keep = p_keep;
        self
    }

    pub fn with_feature_res(mut self, feature_res: usize) -> Self {
        self.feature_res = feature_res;
        self
    }

    pub fn with_fill_policy(mut self, fill_policy: FillPolicy) -> Self {
        self.fill_policy = fill_policy;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(Seed::new(seed));
        self
    }

    pub fn with_identity_first(mut self, keep_first_identity: bool) -> Self {
        self.keep_first_identity = keep_first_identity;
        self
    }

    pub fn with_keep_masks(mut self, keep_masks: bool) -> Self {
        self.keep_masks = keep_masks;
        self
    }

    pub fn with_keep_predictions(mut self, keep_predictions: bool) -> Self {
        self.keep_predictions = keep_predictions;
        self
    }

    /// Resolves the seed to use for this request.
    pub fn resolved_seed(&self) -> Seed {
        self.seed.unwrap_or_else(Seed::from_entropy)
    }

    /// Checks the parameters against the shape they will be used with.
    pub fn validate(&self, shape: &InputShape) -> Result<()> {
        check_probability(self.p_keep)?;
        if self.number_of_masks == 0 {
            return Err(SaliencyError::InvalidInput(
                "At least one mask must be requested.".to_string(),
            ));
        }
        shape.check_resolution(self.feature_res)
    }
}
