// src/core/data.rs
use crate::core::errors::{Result, SaliencyError};
use ndarray::{Array2, ArrayD, Axis, IxDyn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single input instance: time series `[steps, channels]`, image
/// `[height, width, channels]` or tabular `[features]`.
pub type Instance = ArrayD<f64>;

/// The data modality implied by the rank of an [`InputShape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modality {
    /// `[features]`
    Tabular,
    /// `[time_steps, channels]`
    TimeSeries,
    /// `[height, width, channels...]`, channels last.
    Image,
}

/// Ordered dimension sizes of one input instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>")]
pub struct InputShape(Vec<usize>);

impl TryFrom<Vec<usize>> for InputShape {
    type Error = SaliencyError;

    fn try_from(dims: Vec<usize>) -> Result<Self> {
        InputShape::new(dims)
    }
}

impl InputShape {
    pub fn new(dims: impl Into<Vec<usize>>) -> Result<Self> {
        let dims = dims.into();
        if dims.is_empty() {
            return Err(SaliencyError::InvalidInput(
                "Input shape must have at least one axis.".to_string(),
            ));
        }
        if let Some(axis) = dims.iter().position(|&d| d == 0) {
            return Err(SaliencyError::InvalidInput(format!(
                "Input shape {:?} has zero elements along axis {}.",
                dims, axis
            )));
        }
        Ok(InputShape(dims))
    }

    /// Shape of an existing instance.
    pub fn of(instance: &Instance) -> Result<Self> {
        Self::new(instance.shape().to_vec())
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Total number of cells in one instance.
    pub fn size(&self) -> usize {
        self.0.iter().product()
    }

    pub fn modality(&self) -> Modality {
        match self.0.len() {
            1 => Modality::Tabular,
            2 => Modality::TimeSeries,
            _ => Modality::Image,
        }
    }

    /// Length of the leading (time/feature/height) axis.
    pub fn time_steps(&self) -> usize {
        self.0[0]
    }

    /// Size of the trailing channel axis; tabular inputs have one channel.
    pub fn channels(&self) -> usize {
        match self.modality() {
            Modality::Tabular => 1,
            _ => self.0[self.0.len() - 1],
        }
    }

    /// Axes a coarse grid is laid over for this modality.
    pub fn relevant_axes(&self) -> &'static [usize] {
        match self.modality() {
            Modality::Tabular | Modality::TimeSeries => &[0],
            Modality::Image => &[0, 1],
        }
    }

    /// Fails with `DegenerateResolution` if `feature_res` exceeds any relevant axis.
    pub fn check_resolution(&self, feature_res: usize) -> Result<()> {
        if feature_res == 0 {
            return Err(SaliencyError::InvalidInput(
                "Feature resolution must be at least 1.".to_string(),
            ));
        }
        for &axis in self.relevant_axes() {
            if feature_res > self.0[axis] {
                return Err(SaliencyError::DegenerateResolution {
                    resolution: feature_res,
                    axis,
                    size: self.0[axis],
                });
            }
        }
        Ok(())
    }

    /// `[number_of_masks, *dims]`
    pub fn batch_shape(&self, number_of_masks: usize) -> Vec<usize> {
        let mut shape = Vec::with_capacity(self.0.len() + 1);
        shape.push(number_of_masks);
        shape.extend_from_slice(&self.0);
        shape
    }
}

impl fmt::Display for InputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.0.iter().map(|d| d.to_string()).collect();
        write!(f, "({})", dims.join(" x "))
    }
}

/// Value written into perturbed cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillPolicy {
    /// Scalar mean of the instance being explained.
    #[default]
    Mean,
    Zero,
}

impl FillPolicy {
    pub fn fill_value(&self, instance: &Instance) -> f64 {
        match self {
            FillPolicy::Mean => instance.mean().unwrap_or(0.0),
            FillPolicy::Zero => 0.0,
        }
    }
}

/// A batch of masks congruent to one input shape. The dtype never mixes
/// within a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum MaskBatch {
    Boolean(ArrayD<bool>),
    Float(ArrayD<f64>),
}

impl MaskBatch {
    pub fn len(&self) -> usize {
        self.shape()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full batch shape, `[number_of_masks, *input_shape]`.
    pub fn shape(&self) -> &[usize] {
        match self {
            MaskBatch::Boolean(m) => m.shape(),
            MaskBatch::Float(m) => m.shape(),
        }
    }

    /// Shape of a single mask.
    pub fn mask_shape(&self) -> &[usize] {
        &self.shape()[1..]
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, MaskBatch::Boolean(_))
    }

    /// Fraction of kept content over the whole batch. Float masks count
    /// their weights.
    pub fn keep_fraction(&self) -> f64 {
        match self {
            MaskBatch::Boolean(m) if !m.is_empty() => {
                m.iter().filter(|&&keep| keep).count() as f64 / m.len() as f64
            }
            MaskBatch::Float(m) => m.mean().unwrap_or(0.0),
            MaskBatch::Boolean(_) => 0.0,
        }
    }

    /// Weight of every cell as `f64`, for aggregation.
    pub fn to_weights(&self) -> ArrayD<f64> {
        match self {
            MaskBatch::Boolean(m) => m.mapv(|keep| if keep { 1.0 } else { 0.0 }),
            MaskBatch::Float(m) => m.clone(),
        }
    }

    /// Forces mask 0 to keep everything so the first perturbed row is the
    /// unperturbed instance. Local surrogate regressions use it as their
    /// reference sample.
    pub fn with_identity_first(mut self) -> Self {
        if self.is_empty() {
            return self;
        }
        match &mut self {
            MaskBatch::Boolean(m) => m.index_axis_mut(Axis(0), 0).fill(true),
            MaskBatch::Float(m) => m.index_axis_mut(Axis(0), 0).fill(1.0),
        }
        self
    }
}

impl From<ArrayD<bool>> for MaskBatch {
    fn from(masks: ArrayD<bool>) -> Self {
        MaskBatch::Boolean(masks)
    }
}

impl From<ArrayD<f64>> for MaskBatch {
    fn from(masks: ArrayD<f64>) -> Self {
        MaskBatch::Float(masks)
    }
}

/// Per-class relevance map produced by aggregating model outputs over a
/// mask batch.
#[derive(Debug, Clone)]
pub struct Saliency {
    /// `[classes, *input_shape]`
    pub values: ArrayD<f64>,
    pub number_of_masks: usize,
    pub p_keep: f64,
    /// The mask batch the values were aggregated from, when requested.
    pub masks: Option<MaskBatch>,
    /// Raw model output, `[number_of_masks, classes]`, when requested.
    pub predictions: Option<Array2<f64>>,
}

impl Saliency {
    pub fn num_classes(&self) -> usize {
        self.values.shape()[0]
    }

    /// Relevance map of a single class.
    pub fn class_map(&self, class: usize) -> Result<ArrayD<f64>> {
        if class >= self.num_classes() {
            return Err(SaliencyError::InvalidInput(format!(
                "Class {} requested, explanation covers {} classes.",
                class,
                self.num_classes()
            )));
        }
        Ok(self.values.index_axis(Axis(0), class).to_owned())
    }

    pub fn input_shape(&self) -> IxDyn {
        IxDyn(&self.values.shape()[1..])
    }
}

impl fmt::Display for Saliency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Saliency:")?;
        writeln!(f, "  Masks:  {}", self.number_of_masks)?;
        writeln!(f, "  p_keep: {:.4}", self.p_keep)?;
        if let Some(masks) = &self.masks {
            writeln!(f, "  Kept fraction: {:.4}", masks.keep_fraction())?;
        }
        for (class, map) in self.values.axis_iter(Axis(0)).enumerate() {
            let max = map.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let min = map.iter().cloned().fold(f64::INFINITY, f64::min);
            writeln!(f, "  Class {}: min {:.4}, max {:.4}", class, min, max)?;
        }
        Ok(())
    }
}
