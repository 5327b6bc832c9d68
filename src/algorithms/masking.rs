// src/algorithms/masking.rs
use crate::core::{FillPolicy, Instance, MaskBatch, Result, SaliencyError};
use ndarray::{ArrayD, Axis, IxDyn, Zip};

/// Builds the perturbed batch for one instance.
///
/// Row `i` equals the instance wherever mask `i` keeps a cell and the fill
/// value elsewhere. Float masks blend `w * x + (1 - w) * fill`; weights of
/// exactly 1 and 0 copy the instance or the fill value unchanged, so an
/// identity mask reproduces the instance bit for bit.
pub fn mask_data(instance: &Instance, masks: &MaskBatch, fill_policy: FillPolicy) -> Result<ArrayD<f64>> {
    if masks.mask_shape() != instance.shape() {
        return Err(SaliencyError::ShapeMismatch(format!(
            "Masks of shape {:?} cannot be applied to an instance of shape {:?}.",
            masks.mask_shape(),
            instance.shape()
        )));
    }
    let fill = fill_policy.fill_value(instance);
    let mut perturbed = ArrayD::zeros(IxDyn(masks.shape()));

    match masks {
        MaskBatch::Boolean(masks) => {
            for (mut row, mask) in perturbed.outer_iter_mut().zip(masks.outer_iter()) {
                Zip::from(&mut row)
                    .and(&mask)
                    .and(instance)
                    .for_each(|out, &keep, &value| *out = if keep { value } else { fill });
            }
        }
        MaskBatch::Float(masks) => {
            for (mut row, mask) in perturbed.outer_iter_mut().zip(masks.outer_iter()) {
                Zip::from(&mut row)
                    .and(&mask)
                    .and(instance)
                    .for_each(|out, &weight, &value| *out = blend(weight, value, fill));
            }
        }
    }
    tracing::trace!(rows = perturbed.len_of(Axis(0)), fill, "perturbed batch built");
    Ok(perturbed)
}

fn blend(weight: f64, value: f64, fill: f64) -> f64 {
    if weight >= 1.0 {
        value
    } else if weight <= 0.0 {
        fill
    } else {
        weight * value + (1.0 - weight) * fill
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};

    fn univariate(num_steps: usize) -> Instance {
        ndarray::Array::from_shape_fn((num_steps, 1), |(t, _)| t as f64).into_dyn()
    }

    #[test]
    fn kept_cells_copy_and_dropped_cells_fill() {
        let instance = univariate(4);
        let masks = MaskBatch::Boolean(array![[[true], [false], [true], [false]]].into_dyn());
        let out = mask_data(&instance, &masks, FillPolicy::Mean).unwrap();
        assert_eq!(out.shape(), &[1, 4, 1]);
        assert_eq!(out.iter().cloned().collect::<Vec<_>>(), vec![0.0, 1.5, 2.0, 1.5]);

        let out = mask_data(&instance, &masks, FillPolicy::Zero).unwrap();
        assert_eq!(out.iter().cloned().collect::<Vec<_>>(), vec![0.0, 0.0, 2.0, 0.0]);
    }

    #[test]
    fn float_masks_blend_linearly() {
        let instance = array![4.0, 0.0].into_dyn();
        let masks = MaskBatch::Float(array![[0.25, 1.0]].into_dyn());
        let out = mask_data(&instance, &masks, FillPolicy::Mean).unwrap();
        // mean is 2.0
        assert!((out[[0, 0]] - 2.5).abs() < 1e-12);
        assert_eq!(out[[0, 1]], 0.0);
    }

    #[test]
    fn identity_mask_reproduces_instance_bits() {
        let instance = array![[-0.0, 0.1], [1e-300, 3.3]].into_dyn();
        let masks = MaskBatch::Float(Array3::from_elem((2, 2, 2), 0.5).into_dyn()).with_identity_first();
        let out = mask_data(&instance, &masks, FillPolicy::Mean).unwrap();
        for (a, b) in out.index_axis(Axis(0), 0).iter().zip(instance.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn shape_mismatch_is_fatal() {
        let instance = univariate(10);
        let masks = MaskBatch::Boolean(ArrayD::from_elem(IxDyn(&[3, 9, 1]), true));
        assert!(matches!(
            mask_data(&instance, &masks, FillPolicy::Mean),
            Err(SaliencyError::ShapeMismatch(_))
        ));
    }
}
