//! One-hot class masks.
//!
//! Labels `[batch, height, width]` expand to boolean masks
//! `[batch, classes, height, width]`. Pixels that must not be scored are
//! rewritten to the excluded sentinel (`nclasses`) before encoding, which
//! yields an all-false column for them.

use burn::tensor::{backend::Backend, Bool, ElementConversion, Int, Tensor};

use crate::error::{MetricError, MetricResult};

/// Label value marking a pixel that belongs to no class.
pub const fn excluded_label(nclasses: usize) -> i64 {
    nclasses as i64
}

/// Encodes labels in `[0, nclasses)` as one-hot masks.
///
/// # Shapes
///
/// - labels: `[batch_size, height, width]`
/// - returns: `[batch_size, nclasses, height, width]`
pub fn one_hot<B: Backend>(
    labels: Tensor<B, 3, Int>,
    nclasses: usize,
) -> MetricResult<Tensor<B, 4, Bool>> {
    check_label_range(&labels, nclasses)?;
    Ok(encode(labels, nclasses))
}

/// Encodes labels as one-hot masks, leaving the `excluded` pixels all-false.
///
/// Only the pixels that are not excluded must lie in `[0, nclasses)`, so an
/// ignore sentinel such as 255 may appear under the mask.
pub fn one_hot_masked<B: Backend>(
    labels: Tensor<B, 3, Int>,
    nclasses: usize,
    excluded: Tensor<B, 3, Bool>,
) -> MetricResult<Tensor<B, 4, Bool>> {
    check_label_range(&labels.clone().mask_fill(excluded.clone(), 0), nclasses)?;
    Ok(encode(exclude_pixels(labels, excluded, nclasses), nclasses))
}

/// Rewrites every pixel selected by `mask` to [`excluded_label`].
pub fn exclude_pixels<B: Backend>(
    labels: Tensor<B, 3, Int>,
    mask: Tensor<B, 3, Bool>,
    nclasses: usize,
) -> Tensor<B, 3, Int> {
    labels.mask_fill(mask, excluded_label(nclasses))
}

fn encode<B: Backend>(labels: Tensor<B, 3, Int>, nclasses: usize) -> Tensor<B, 4, Bool> {
    let masks = (0..nclasses)
        .map(|class| labels.clone().equal_elem(class as i64))
        .collect::<Vec<_>>();
    Tensor::stack(masks, 1)
}

fn check_label_range<B: Backend>(labels: &Tensor<B, 3, Int>, nclasses: usize) -> MetricResult<()> {
    if nclasses == 0 {
        return Err(MetricError::InvalidConfiguration {
            reason: "one-hot encoding needs at least one class".to_owned(),
        });
    }
    if labels.shape().num_elements() == 0 {
        return Ok(());
    }

    let min = labels.clone().min().into_scalar().elem::<i64>();
    if min < 0 {
        return Err(MetricError::LabelOutOfRange {
            label: min,
            nclasses,
        });
    }
    let max = labels.clone().max().into_scalar().elem::<i64>();
    if max >= excluded_label(nclasses) {
        return Err(MetricError::LabelOutOfRange {
            label: max,
            nclasses,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use burn::tensor::TensorData;

    use super::*;
    use crate::tests::TestBackend;

    fn flags(mask: Tensor<TestBackend, 4, Bool>) -> Vec<i64> {
        mask.int().into_data().iter::<i64>().collect()
    }

    #[test]
    fn encodes_each_pixel_into_exactly_one_class() {
        let device = Default::default();
        let labels =
            Tensor::<TestBackend, 3, Int>::from_data(TensorData::from([[[0, 2], [1, 0]]]), &device);

        let mask = one_hot(labels, 3).unwrap();

        assert_eq!(mask.dims(), [1, 3, 2, 2]);
        #[rustfmt::skip]
        let expected = vec![
            1, 0, 0, 1, // class 0
            0, 0, 1, 0, // class 1
            0, 1, 0, 0, // class 2
        ];
        assert_eq!(flags(mask), expected);
    }

    #[test]
    fn rejects_labels_outside_the_class_range() {
        let device = Default::default();
        let labels =
            Tensor::<TestBackend, 3, Int>::from_data(TensorData::from([[[0, 3]]]), &device);

        assert_eq!(
            one_hot(labels, 3).unwrap_err(),
            MetricError::LabelOutOfRange {
                label: 3,
                nclasses: 3
            }
        );
    }

    #[test]
    fn rejects_negative_labels() {
        let device = Default::default();
        let labels =
            Tensor::<TestBackend, 3, Int>::from_data(TensorData::from([[[-1, 0]]]), &device);

        assert!(matches!(
            one_hot(labels, 2),
            Err(MetricError::LabelOutOfRange { label: -1, .. })
        ));
    }

    #[test]
    fn excluded_pixels_encode_as_all_false() {
        let device = Default::default();
        let labels =
            Tensor::<TestBackend, 3, Int>::from_data(TensorData::from([[[1, 255]]]), &device);
        let ignored = labels.clone().equal_elem(255);

        let mask = one_hot_masked(labels, 2, ignored).unwrap();

        assert_eq!(flags(mask), vec![0, 0, 1, 0]);
    }

    #[test]
    fn masked_encoding_still_checks_scored_pixels() {
        let device = Default::default();
        let labels =
            Tensor::<TestBackend, 3, Int>::from_data(TensorData::from([[[2, 255]]]), &device);
        let ignored = labels.clone().equal_elem(255);

        assert!(matches!(
            one_hot_masked(labels, 2, ignored),
            Err(MetricError::LabelOutOfRange { label: 2, .. })
        ));
    }
}
