use std::fmt;

use itertools::izip;
use serde::Deserialize;
use serde::Serialize;

use crate::range::Range;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("sizes and strides have different dimensionality: {sizes} != {strides}")]
    DimMismatch { sizes: usize, strides: usize },

    #[error("coordinate rank {rank} does not match layout rank {num_dim}")]
    RankMismatch { rank: usize, num_dim: usize },

    #[error("coordinate {coordinate} out of range for dimension {dim} of size {size}")]
    CoordinateOutOfRange {
        coordinate: usize,
        dim: usize,
        size: usize,
    },

    #[error("index {index} out of range {total}")]
    IndexOutOfRange { index: usize, total: usize },

    #[error("range {range} out of bounds for dimension {dim} of size {size}")]
    RangeOutOfBounds {
        range: Range,
        dim: usize,
        size: usize,
    },

    #[error("zero stride in range {range} for dimension {dim}")]
    ZeroStride { range: Range, dim: usize },

    #[error("{actual} elements cannot fill a layout of {expected} elements")]
    LengthMismatch { expected: usize, actual: usize },
}

/// An affine map from N-dimensional coordinates to locations in a flat
/// buffer: `location = offset + sum(coordinate[i] * strides[i])`.
///
/// Selecting a sub-range of a layout produces another layout over the
/// same buffer, so views never copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Layout {
    offset: usize,
    sizes: Vec<usize>,
    strides: Vec<usize>,
}

impl Layout {
    pub fn new(offset: usize, sizes: Vec<usize>, strides: Vec<usize>) -> Result<Self, LayoutError> {
        if sizes.len() != strides.len() {
            return Err(LayoutError::DimMismatch {
                sizes: sizes.len(),
                strides: strides.len(),
            });
        }
        Ok(Self {
            offset,
            sizes,
            strides,
        })
    }

    /// A contiguous row-major layout of the given sizes.
    pub fn new_row_major(sizes: impl Into<Vec<usize>>) -> Self {
        let sizes = sizes.into();
        let mut strides = vec![1; sizes.len()];
        for dim in (0..sizes.len().saturating_sub(1)).rev() {
            strides[dim] = strides[dim + 1] * sizes[dim + 1];
        }
        Self {
            offset: 0,
            sizes,
            strides,
        }
    }

    pub fn num_dim(&self) -> usize {
        self.sizes.len()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Number of coordinates in the layout.
    pub fn len(&self) -> usize {
        self.sizes.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the layout is row-major contiguous, starting anywhere.
    pub fn is_contiguous(&self) -> bool {
        self.strides == Layout::new_row_major(self.sizes.clone()).strides
    }

    /// The buffer location of a coordinate.
    pub fn location(&self, coord: &[usize]) -> Result<usize, LayoutError> {
        if coord.len() != self.num_dim() {
            return Err(LayoutError::RankMismatch {
                rank: coord.len(),
                num_dim: self.num_dim(),
            });
        }
        for (dim, (&coordinate, &size)) in coord.iter().zip(&self.sizes).enumerate() {
            if coordinate >= size {
                return Err(LayoutError::CoordinateOutOfRange {
                    coordinate,
                    dim,
                    size,
                });
            }
        }
        Ok(self.location_unchecked(coord))
    }

    pub(crate) fn location_unchecked(&self, coord: &[usize]) -> usize {
        self.offset
            + coord
                .iter()
                .zip(&self.strides)
                .map(|(c, s)| c * s)
                .sum::<usize>()
    }

    /// The coordinate of the `rank`-th element in row-major order.
    pub fn coordinates(&self, rank: usize) -> Result<Vec<usize>, LayoutError> {
        let total = self.len();
        if rank >= total {
            return Err(LayoutError::IndexOutOfRange { index: rank, total });
        }
        let mut coord = vec![0; self.num_dim()];
        let mut rest = rank;
        for dim in (0..self.num_dim()).rev() {
            coord[dim] = rest % self.sizes[dim];
            rest /= self.sizes[dim];
        }
        Ok(coord)
    }

    /// Sub-set this layout by one range per dimension. A range may start
    /// at the end of a dimension, producing an empty dimension.
    pub fn select(&self, ranges: &[Range]) -> Result<Self, LayoutError> {
        if ranges.len() != self.num_dim() {
            return Err(LayoutError::RankMismatch {
                rank: ranges.len(),
                num_dim: self.num_dim(),
            });
        }
        let mut offset = self.offset;
        let mut sizes = Vec::with_capacity(self.num_dim());
        let mut strides = Vec::with_capacity(self.num_dim());
        for (dim, (range, &size, &stride)) in izip!(ranges, &self.sizes, &self.strides).enumerate()
        {
            let (begin, _, step) = range.resolve(size);
            if step == 0 {
                return Err(LayoutError::ZeroStride { range: *range, dim });
            }
            if begin > size {
                return Err(LayoutError::RangeOutOfBounds {
                    range: *range,
                    dim,
                    size,
                });
            }
            let len = range.len_within(size);
            if len > 0 {
                offset += begin * stride;
            }
            sizes.push(len);
            strides.push(stride * step);
        }
        Layout::new(offset, sizes, strides)
    }

    /// Iterate over all coordinates in row-major order.
    pub fn coords(&self) -> Coordinates {
        Coordinates::new(self.sizes.clone())
    }

    /// Iterate over the buffer locations of all coordinates in row-major
    /// order.
    pub fn iter(&self) -> LayoutIterator<'_> {
        LayoutIterator {
            layout: self,
            coords: self.coords(),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.offset)?;
        for (size, stride) in self.sizes.iter().zip(&self.strides) {
            write!(f, " {}x{}", size, stride)?;
        }
        Ok(())
    }
}

/// Row-major iterator over every coordinate of a set of dimension sizes.
#[derive(Debug, Clone)]
pub struct Coordinates {
    sizes: Vec<usize>,
    next: Option<Vec<usize>>,
}

impl Coordinates {
    pub fn new(sizes: Vec<usize>) -> Self {
        let next = if sizes.contains(&0) {
            None
        } else {
            Some(vec![0; sizes.len()])
        };
        Self { sizes, next }
    }
}

impl Iterator for Coordinates {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        let mut next = current.clone();
        for dim in (0..self.sizes.len()).rev() {
            next[dim] += 1;
            if next[dim] < self.sizes[dim] {
                self.next = Some(next);
                return Some(current);
            }
            next[dim] = 0;
        }
        // Rolled over every dimension: `current` was the last coordinate.
        Some(current)
    }
}

/// Iterator over the buffer locations of a [`Layout`].
#[derive(Debug)]
pub struct LayoutIterator<'a> {
    layout: &'a Layout,
    coords: Coordinates,
}

impl Iterator for LayoutIterator<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let coord = self.coords.next()?;
        Some(self.layout.location_unchecked(&coord))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major() {
        let l = Layout::new_row_major(vec![2, 3, 4]);
        assert_eq!(l.strides(), &[12, 4, 1]);
        assert_eq!(l.len(), 24);
        assert!(l.is_contiguous());
        assert_eq!(l.location(&[1, 2, 3]).unwrap(), 23);
        assert_eq!(l.coordinates(23).unwrap(), vec![1, 2, 3]);
        assert_eq!(l.to_string(), "[0] 2x12 3x4 4x1");
    }

    #[test]
    fn test_location_errors() {
        let l = Layout::new_row_major(vec![2, 3]);
        assert_eq!(
            l.location(&[2, 0]).unwrap_err(),
            LayoutError::CoordinateOutOfRange {
                coordinate: 2,
                dim: 0,
                size: 2
            }
        );
        assert_eq!(
            l.location(&[0]).unwrap_err(),
            LayoutError::RankMismatch { rank: 1, num_dim: 2 }
        );
        assert_eq!(
            l.coordinates(6).unwrap_err(),
            LayoutError::IndexOutOfRange { index: 6, total: 6 }
        );
        assert!(Layout::new(0, vec![2], vec![1, 1]).is_err());
    }

    #[test]
    fn test_iter() {
        let l = Layout::new_row_major(vec![2, 3]);
        assert_eq!(l.iter().collect::<Vec<_>>(), (0..6).collect::<Vec<_>>());

        let scalar = Layout::new_row_major(Vec::new());
        assert_eq!(scalar.iter().collect::<Vec<_>>(), vec![0]);

        let empty = Layout::new_row_major(vec![3, 0]);
        assert_eq!(empty.iter().count(), 0);
    }

    #[test]
    fn test_select() {
        let l = Layout::new_row_major(vec![4, 8]);
        let s = l.select(&[Range::from(1..3), Range::from(2..6)]).unwrap();
        assert_eq!(s.sizes(), &[2, 4]);
        assert_eq!(s.offset(), 8 + 2);
        assert!(!s.is_contiguous());
        assert_eq!(
            s.iter().collect::<Vec<_>>(),
            vec![10, 11, 12, 13, 18, 19, 20, 21]
        );

        let strided = l.select(&[Range::full(), Range(1, None, 3)]).unwrap();
        assert_eq!(strided.sizes(), &[4, 3]);
        assert_eq!(strided.strides(), &[8, 3]);
        assert_eq!(strided.location(&[1, 2]).unwrap(), 8 + 7);
    }

    #[test]
    fn test_select_edges() {
        let l = Layout::new_row_major(vec![4, 8]);
        let empty = l.select(&[Range::from(4..4), Range::full()]).unwrap();
        assert_eq!(empty.sizes(), &[0, 8]);
        assert!(empty.is_empty());

        assert_eq!(
            l.select(&[Range::from(5..6), Range::full()]).unwrap_err(),
            LayoutError::RangeOutOfBounds {
                range: Range(5, Some(6), 1),
                dim: 0,
                size: 4
            }
        );
        assert!(l.select(&[Range(0, None, 0), Range::full()]).is_err());
        assert!(l.select(&[Range::full()]).is_err());
    }
}
