//! Conversions between `ndarray` arrays and the flat column-major buffers used by the operators.

use crate::error::{ConvolutionError, Result};
use crate::shape::Shape;
use ndarray::{ArrayBase, ArrayD, Data, Dimension, IxDyn, ShapeBuilder};

/// Shape of an array.
pub fn shape_of<S, D>(array: &ArrayBase<S, D>) -> Result<Shape>
where
    S: Data,
    D: Dimension,
{
    Shape::from_dims(array.shape())
}

/// Copies an array into a flat buffer where axis 0 varies fastest.
///
/// Iterating over the transposed view visits the samples in column-major order whatever the
/// memory layout of the array is.
pub fn flatten<A, S, D>(array: &ArrayBase<S, D>) -> Vec<A>
where
    A: Clone,
    S: Data<Elem = A>,
    D: Dimension,
{
    array.t().iter().cloned().collect()
}

/// Builds an array of `shape` from a flat column-major buffer.
///
/// # Errors
/// - `SizeMismatch` if `values` does not hold `shape.number()` samples.
pub fn unflatten<A>(shape: &Shape, values: Vec<A>) -> Result<ArrayD<A>> {
    if values.len() != shape.number() {
        return Err(ConvolutionError::SizeMismatch {
            what: "array",
            expected: shape.number(),
            found: values.len(),
        });
    }
    Ok(ArrayD::from_shape_vec(IxDyn(shape.dims()).f(), values)?)
}

/// Checks that `array` has exactly the shape `expected`.
pub fn check_shape<S, D>(array: &ArrayBase<S, D>, expected: &Shape, what: &'static str) -> Result<()>
where
    S: Data,
    D: Dimension,
{
    if array.ndim() != expected.rank() {
        return Err(ConvolutionError::RankMismatch {
            expected: expected.rank(),
            found: array.ndim(),
        });
    }
    for (axis, (&found, &dim)) in array.shape().iter().zip(expected.dims()).enumerate() {
        if found != dim {
            log::debug!("{what} has length {found} on axis {axis}, expected {dim}");
            return Err(ConvolutionError::SizeMismatch {
                what,
                expected: dim,
                found,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_flatten_is_column_major_for_any_layout() {
        let a: Array2<i32> = array![[0, 2, 4], [1, 3, 5]];
        assert_eq!(flatten(&a), vec![0, 1, 2, 3, 4, 5]);
        let f = Array2::from_shape_vec((2, 3).f(), vec![0, 1, 2, 3, 4, 5]).unwrap();
        assert_eq!(f, a);
        assert_eq!(flatten(&f), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_unflatten_restores_array() {
        let a: Array2<f64> = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let shape = shape_of(&a).unwrap();
        let b = unflatten(&shape, flatten(&a)).unwrap();
        assert_eq!(b.shape(), &[3, 2]);
        assert_eq!(b[[2, 1]], 6.0);
        assert_eq!(b.into_dimensionality::<ndarray::Ix2>().unwrap(), a);
    }

    #[test]
    fn test_check_shape() {
        let a = Array2::<f32>::zeros((3, 2));
        let good = Shape::from_dims(&[3, 2]).unwrap();
        let bad = Shape::from_dims(&[2, 3]).unwrap();
        assert!(check_shape(&a, &good, "data").is_ok());
        assert!(matches!(
            check_shape(&a, &bad, "data"),
            Err(ConvolutionError::SizeMismatch { what: "data", .. })
        ));
        assert!(matches!(
            check_shape(&a, &Shape::from_dims(&[6]).unwrap(), "data"),
            Err(ConvolutionError::RankMismatch { .. })
        ));
    }
}
