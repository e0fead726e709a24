//! Shapes of the object and data spaces.
//!
//! Samples are stored in column-major raster order: axis 0 varies fastest. The whole crate
//! (transform, MTF centering, windows, ndarray interop) follows this single convention.

use crate::error::{ConvolutionError, Result};
use std::fmt::{Display, Formatter};

/// An immutable list of strictly positive dimension lengths together with its strides.
///
/// # Fields
/// - `dims`: The length of every axis.
/// - `strides`: The distance between consecutive samples along every axis.
/// - `number`: The total number of samples.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Vec<usize>,
    strides: Vec<usize>,
    number: usize,
}

impl Shape {
    /// Creates a shape from its dimension list.
    ///
    /// # Errors
    /// - `InvalidShape` if `dims` is empty, any dimension is zero or the number of samples
    ///   overflows `usize`.
    pub fn from_dims(dims: &[usize]) -> Result<Self> {
        if dims.is_empty() || dims.contains(&0) {
            return Err(ConvolutionError::InvalidShape(dims.to_vec()));
        }
        let mut strides = Vec::with_capacity(dims.len());
        let mut number: usize = 1;
        for &d in dims {
            strides.push(number);
            number = number
                .checked_mul(d)
                .ok_or_else(|| ConvolutionError::InvalidShape(dims.to_vec()))?;
        }
        Ok(Shape {
            dims: dims.to_vec(),
            strides,
            number,
        })
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dimension(&self, axis: usize) -> usize {
        self.dims[axis]
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn stride(&self, axis: usize) -> usize {
        self.strides[axis]
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Total number of samples.
    pub fn number(&self) -> usize {
        self.number
    }

    /// Flat position of a multi-index.
    pub fn offset_of(&self, index: &[usize]) -> usize {
        index
            .iter()
            .zip(&self.strides)
            .map(|(i, s)| i * s)
            .sum()
    }

    /// Calls `func(flat, index)` for every sample, in raster order.
    ///
    /// The multi-index is advanced like an odometer, so no division is needed per sample.
    pub fn for_each_index<F>(&self, mut func: F)
    where
        F: FnMut(usize, &[usize]),
    {
        let mut index = vec![0usize; self.rank()];
        for flat in 0..self.number {
            func(flat, &index);
            for (i, &d) in index.iter_mut().zip(&self.dims) {
                *i += 1;
                if *i < d {
                    break;
                }
                *i = 0;
            }
        }
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (axis, d) in self.dims.iter().enumerate() {
            if axis > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        if self.dims.len() == 1 {
            write!(f, ",")?;
        }
        write!(f, ")")
    }
}

/// An axis-aligned sub-region of the object space where the data live.
///
/// `indices` holds, for every data sample in data raster order, the flat position of the
/// matching object-space sample. It is computed once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    shape: Shape,
    offset: Vec<usize>,
    full: bool,
    indices: Vec<usize>,
}

impl Window {
    /// Creates the window `[offset, offset + data)` inside `object`.
    ///
    /// # Errors
    /// - `RankMismatch` if the ranks of `object`, `data` and `offset` differ.
    /// - `OutOfRange` if the window exceeds the object space on any axis.
    pub fn new(object: &Shape, data: Shape, offset: &[usize]) -> Result<Self> {
        if data.rank() != object.rank() {
            return Err(ConvolutionError::RankMismatch {
                expected: object.rank(),
                found: data.rank(),
            });
        }
        if offset.len() != object.rank() {
            return Err(ConvolutionError::RankMismatch {
                expected: object.rank(),
                found: offset.len(),
            });
        }
        for axis in 0..object.rank() {
            let limit = object.dimension(axis);
            match offset[axis].checked_add(data.dimension(axis)) {
                Some(end) if end <= limit => {}
                end => {
                    return Err(ConvolutionError::OutOfRange {
                        what: "data window",
                        axis,
                        value: end.unwrap_or(usize::MAX),
                        limit,
                    });
                }
            }
        }

        let base = object.offset_of(offset);
        let mut indices = Vec::with_capacity(data.number());
        data.for_each_index(|_, index| {
            indices.push(base + object.offset_of(index));
        });

        let full = data == *object && offset.iter().all(|&o| o == 0);
        Ok(Window {
            shape: data,
            offset: offset.to_vec(),
            full,
            indices,
        })
    }

    /// The window covering the whole object space.
    pub fn full(object: &Shape) -> Self {
        Window {
            shape: object.clone(),
            offset: vec![0; object.rank()],
            full: true,
            indices: (0..object.number()).collect(),
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn offset(&self) -> &[usize] {
        &self.offset
    }

    /// True when the window is the whole object space.
    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strides_are_column_major() {
        let shape = Shape::from_dims(&[4, 3, 2]).unwrap();
        assert_eq!(shape.rank(), 3);
        assert_eq!(shape.number(), 24);
        assert_eq!(shape.strides(), &[1, 4, 12]);
        assert_eq!(shape.offset_of(&[1, 2, 1]), 1 + 8 + 12);
        assert_eq!(shape.to_string(), "(4, 3, 2)");
        assert_eq!(Shape::from_dims(&[5]).unwrap().to_string(), "(5,)");
    }

    #[test]
    fn test_invalid_shapes_are_rejected() {
        assert!(matches!(
            Shape::from_dims(&[]),
            Err(ConvolutionError::InvalidShape(_))
        ));
        assert!(matches!(
            Shape::from_dims(&[3, 0]),
            Err(ConvolutionError::InvalidShape(_))
        ));
        assert!(matches!(
            Shape::from_dims(&[usize::MAX, 2]),
            Err(ConvolutionError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_for_each_index_visits_raster_order() {
        let shape = Shape::from_dims(&[2, 3]).unwrap();
        let mut visited = vec![];
        shape.for_each_index(|flat, index| {
            assert_eq!(flat, shape.offset_of(index));
            visited.push(index.to_vec());
        });
        assert_eq!(visited.len(), 6);
        assert_eq!(visited[1], vec![1, 0]);
        assert_eq!(visited[2], vec![0, 1]);
        assert_eq!(visited[5], vec![1, 2]);
    }

    #[test]
    fn test_window_indices() {
        let object = Shape::from_dims(&[4, 3]).unwrap();
        let data = Shape::from_dims(&[2, 2]).unwrap();
        let window = Window::new(&object, data, &[1, 1]).unwrap();
        assert!(!window.is_full());
        assert_eq!(window.indices(), &[5, 6, 9, 10]);
    }

    #[test]
    fn test_window_equal_to_object_is_full() {
        let object = Shape::from_dims(&[4, 3]).unwrap();
        let window = Window::new(&object, object.clone(), &[0, 0]).unwrap();
        assert!(window.is_full());
        assert_eq!(window, Window::full(&object));
    }

    #[test]
    fn test_window_out_of_range() {
        let object = Shape::from_dims(&[4, 3]).unwrap();
        let data = Shape::from_dims(&[2, 2]).unwrap();
        let err = Window::new(&object, data.clone(), &[3, 0]).unwrap_err();
        assert!(matches!(
            err,
            ConvolutionError::OutOfRange {
                axis: 0,
                value: 5,
                limit: 4,
                ..
            }
        ));
        assert!(matches!(
            Window::new(&object, data, &[0]),
            Err(ConvolutionError::RankMismatch { .. })
        ));
    }

    #[test]
    fn test_window_offset_overflow_is_out_of_range() {
        let object = Shape::from_dims(&[4]).unwrap();
        let data = Shape::from_dims(&[2]).unwrap();
        assert!(matches!(
            Window::new(&object, data, &[usize::MAX]),
            Err(ConvolutionError::OutOfRange {
                axis: 0,
                value: usize::MAX,
                limit: 4,
                ..
            })
        ));
    }
}
