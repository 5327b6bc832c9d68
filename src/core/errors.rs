// src/core/errors.rs
use thiserror::Error;

/// Errors raised at the call boundaries of the masking engine.
///
/// Every failure is detected before any array is returned, so callers
/// never observe a partially filled batch.
#[derive(Debug, Error)]
pub enum SaliencyError {
    /// A mask batch is not congruent with the instance it is applied to.
    #[error("Shape Mismatch: {0}")]
    ShapeMismatch(String),
    /// `p_keep` lies outside `(0, 1]`.
    #[error("Invalid Probability: p_keep must lie in (0, 1], got {0}")]
    InvalidProbability(f64),
    /// The coarse grid is finer than the input along a modality-relevant axis.
    #[error("Degenerate Resolution: feature resolution {resolution} exceeds axis {axis} of size {size}")]
    DegenerateResolution {
        resolution: usize,
        axis: usize,
        size: usize,
    },
    #[error("Invalid Input: {0}")]
    InvalidInput(String),
    #[error("Model Prediction Error: {0}")]
    ModelPredictionError(String),
    #[error("Ndarray Error: {0}")]
    NdarrayError(#[from] ndarray::ShapeError),
}

// Convenience type alias for Result
pub type Result<T> = std::result::Result<T, SaliencyError>;

/// Rejects `p_keep` values outside `(0, 1]` before any sampling starts.
pub fn check_probability(p_keep: f64) -> Result<()> {
    if p_keep.is_nan() || p_keep <= 0.0 || p_keep > 1.0 {
        return Err(SaliencyError::InvalidProbability(p_keep));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probability_bounds() {
        assert!(check_probability(1.0).is_ok());
        assert!(check_probability(1e-6).is_ok());
        assert!(matches!(check_probability(0.0), Err(SaliencyError::InvalidProbability(_))));
        assert!(matches!(check_probability(1.01), Err(SaliencyError::InvalidProbability(_))));
        assert!(check_probability(f64::NAN).is_err());
    }

    #[test]
    fn display_messages() {
        let err = SaliencyError::DegenerateResolution { resolution: 12, axis: 0, size: 10 };
        assert_eq!(
            err.to_string(),
            "Degenerate Resolution: feature resolution 12 exceeds axis 0 of size 10"
        );
        let err: SaliencyError = ndarray::Array1::<f64>::zeros(4)
            .into_shape((3, 2))
            .unwrap_err()
            .into();
        assert!(err.to_string().starts_with("Ndarray Error"));
    }
}
