//! A reference-counted dense tensor.
//!
//! [`DenseTensor`] pairs a shared, immutable buffer with a [`Layout`].
//! Extracting a tile only narrows the layout, so tiles are views that
//! share storage with their source. Reflect padding materializes a new,
//! contiguous tensor.

use std::sync::Arc;

use crate::array::ArrayError;
use crate::array::ReflectPaddable;
use crate::array::TileArray;
use crate::array::check_ranges;
use crate::array::padded_shape;
use crate::array::source_coord;
use crate::layout::Layout;
use crate::layout::LayoutError;
use crate::range::Range;

#[derive(Debug, Clone)]
pub struct DenseTensor<T> {
    storage: Arc<[T]>,
    layout: Layout,
}

impl<T> DenseTensor<T> {
    /// Create a tensor of `shape` from row-major `data`.
    pub fn from_vec(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Result<Self, LayoutError> {
        let layout = Layout::new_row_major(shape);
        if layout.len() != data.len() {
            return Err(LayoutError::LengthMismatch {
                expected: layout.len(),
                actual: data.len(),
            });
        }
        Ok(Self {
            storage: data.into(),
            layout,
        })
    }

    /// Create a tensor of `shape` by evaluating `f` at every coordinate.
    pub fn from_shape_fn(shape: impl Into<Vec<usize>>, mut f: impl FnMut(&[usize]) -> T) -> Self {
        let layout = Layout::new_row_major(shape);
        let storage: Arc<[T]> = layout.coords().map(|coord| f(&coord)).collect();
        Self { storage, layout }
    }

    pub fn shape(&self) -> &[usize] {
        self.layout.sizes()
    }

    pub fn rank(&self) -> usize {
        self.layout.num_dim()
    }

    pub fn len(&self) -> usize {
        self.layout.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.is_empty()
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn get(&self, coord: &[usize]) -> Option<&T> {
        let location = self.layout.location(coord).ok()?;
        self.storage.get(location)
    }

    /// Iterate over the elements in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.layout.iter().map(|location| &self.storage[location])
    }

    /// A view of the region selected by one range per axis. The view
    /// shares storage with `self`.
    pub fn view(&self, ranges: &[Range]) -> Result<Self, LayoutError> {
        Ok(Self {
            storage: Arc::clone(&self.storage),
            layout: self.layout.select(ranges)?,
        })
    }

    /// Whether `self` and `other` are backed by the same buffer.
    pub fn shares_storage(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }
}

impl<T: Clone> DenseTensor<T> {
    /// The elements in row-major order.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    /// A tensor with the same contents and a fresh row-major buffer.
    pub fn to_contiguous(&self) -> Self {
        Self {
            storage: self.iter().cloned().collect(),
            layout: Layout::new_row_major(self.shape().to_vec()),
        }
    }
}

impl<T: PartialEq> PartialEq for DenseTensor<T> {
    fn eq(&self, other: &Self) -> bool {
        self.shape() == other.shape() && self.iter().eq(other.iter())
    }
}

impl<T: Clone> TileArray for DenseTensor<T> {
    type Tile = DenseTensor<T>;

    fn shape(&self) -> &[usize] {
        self.layout.sizes()
    }

    fn extract(&self, ranges: &[Range]) -> Result<Self::Tile, ArrayError> {
        check_ranges(self.layout.sizes(), ranges)?;
        Ok(self.view(ranges)?)
    }
}

impl<T: Clone> ReflectPaddable for DenseTensor<T> {
    fn reflect_pad(&self, padding: &[(usize, usize)]) -> Result<Self, ArrayError> {
        let shape = self.layout.sizes();
        let padded = padded_shape(shape, padding)?;
        Ok(DenseTensor::from_shape_fn(padded, |coord| {
            let source = source_coord(coord, shape, padding);
            self.storage[self.layout.location_unchecked(&source)].clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::strategy::gen_padded_shape;

    fn iota(shape: &[usize]) -> DenseTensor<usize> {
        let len = shape.iter().product();
        DenseTensor::from_vec(shape.to_vec(), (0..len).collect()).unwrap()
    }

    #[test]
    fn test_from_vec() {
        let t = iota(&[2, 3]);
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t.get(&[1, 2]), Some(&5));
        assert_eq!(t.get(&[2, 0]), None);
        assert_eq!(
            DenseTensor::from_vec(vec![2, 2], vec![1, 2, 3]).unwrap_err(),
            LayoutError::LengthMismatch {
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn test_extract_is_a_view() {
        let t = iota(&[4, 4]);
        let tile = t.extract(&[Range::from(1..3), Range::from(2..4)]).unwrap();
        assert!(tile.shares_storage(&t));
        assert_eq!(tile.shape(), &[2, 2]);
        assert_eq!(tile.to_vec(), vec![6, 7, 10, 11]);
        assert!(!tile.layout().is_contiguous());

        let copy = tile.to_contiguous();
        assert!(!copy.shares_storage(&t));
        assert_eq!(copy, tile);
        assert!(copy.layout().is_contiguous());
    }

    #[test]
    fn test_extract_invalid() {
        let t = iota(&[4, 4]);
        assert!(matches!(
            t.extract(&[Range::from(2..6), Range::full()]),
            Err(ArrayError::RangeOutOfBounds { axis: 0, .. })
        ));
    }

    #[test]
    fn test_reflect_pad() {
        let t = DenseTensor::from_vec(vec![2, 3], vec![1, 2, 3, 4, 5, 6]).unwrap();
        let padded = t.reflect_pad(&[(1, 1), (2, 0)]).unwrap();
        assert_eq!(padded.shape(), &[4, 5]);
        assert_eq!(
            padded.to_vec(),
            vec![
                6, 5, 4, 5, 6, //
                3, 2, 1, 2, 3, //
                6, 5, 4, 5, 6, //
                3, 2, 1, 2, 3,
            ]
        );
        assert!(padded.layout().is_contiguous());
    }

    #[test]
    fn test_reflect_pad_of_view() {
        let t = iota(&[4, 4]);
        let tile = t.view(&[Range::from(0..2), Range::from(1..4)]).unwrap();
        let padded = tile.reflect_pad(&[(1, 0), (0, 1)]).unwrap();
        assert_eq!(
            padded.to_vec(),
            vec![
                5, 6, 7, 6, //
                1, 2, 3, 2, //
                5, 6, 7, 6,
            ]
        );
    }

    proptest! {
        #[test]
        fn reflect_pad_keeps_interior(
            (shape, padding) in gen_padded_shape(3, 5, 7)
        ) {
            let t = iota(&shape);
            let padded = t.reflect_pad(&padding).unwrap();
            for (axis, (&len, &(before, after))) in shape.iter().zip(&padding).enumerate() {
                prop_assert_eq!(padded.shape()[axis], before + len + after);
            }
            for coord in t.layout().coords() {
                let shifted: Vec<usize> = coord
                    .iter()
                    .zip(&padding)
                    .map(|(&c, &(before, _))| c + before)
                    .collect();
                prop_assert_eq!(padded.get(&shifted), t.get(&coord));
            }
        }
    }
}
