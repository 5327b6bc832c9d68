// src/algorithms/ranks.rs
use crate::core::{Result, SaliencyError};
use crate::utils::argsort_descending;
use ndarray::{Array2, ArrayView2, Axis};
use std::fmt;

/// Empirical probability that time step `t` receives rank `r` (0 = highest
/// weight) across a batch of float masks.
///
/// Order-based samplers assume every row and column of this table is close
/// to `1 / num_steps`.
#[derive(Debug, Clone, PartialEq)]
pub struct RankTable {
    probabilities: Array2<f64>,
}

impl RankTable {
    /// Counts ranks over `masks` of shape `(number_of_masks, num_steps)`.
    /// Ties are ranked by step index.
    pub fn from_masks(masks: ArrayView2<f64>) -> Result<Self> {
        let (number_of_masks, num_steps) = masks.dim();
        if number_of_masks == 0 || num_steps == 0 {
            return Err(SaliencyError::InvalidInput(
                "Rank table needs at least one mask with at least one step.".to_string(),
            ));
        }
        let mut counts = Array2::<f64>::zeros((num_steps, num_steps));
        for mask in masks.axis_iter(Axis(0)) {
            let order = argsort_descending(&mask.to_vec());
            for (rank, &step) in order.iter().enumerate() {
                counts[[step, rank]] += 1.0;
            }
        }
        counts /= number_of_masks as f64;
        Ok(RankTable { probabilities: counts })
    }

    pub fn num_steps(&self) -> usize {
        self.probabilities.nrows()
    }

    /// `[time_step][rank]`
    pub fn probabilities(&self) -> ArrayView2<'_, f64> {
        self.probabilities.view()
    }

    pub fn probability(&self, time_step: usize, rank: usize) -> f64 {
        self.probabilities[[time_step, rank]]
    }

    /// Largest absolute distance of any cell from `1 / num_steps`.
    pub fn max_deviation_from_uniform(&self) -> f64 {
        let uniform = 1.0 / self.num_steps() as f64;
        self.probabilities
            .iter()
            .map(|p| (p - uniform).abs())
            .fold(0.0, f64::max)
    }

    pub fn is_uniform(&self, tolerance: f64) -> bool {
        self.max_deviation_from_uniform() <= tolerance
    }
}

impl fmt::Display for RankTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>10}", "")?;
        for rank in 0..self.num_steps() {
            write!(f, " rank #{:<3}", rank)?;
        }
        writeln!(f)?;
        for (step, row) in self.probabilities.axis_iter(Axis(0)).enumerate() {
            write!(f, "step #{:<4}", step)?;
            for p in row {
                write!(f, " {:>9.4}", p)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
