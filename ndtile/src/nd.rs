//! [`ndarray`] backend. Tiles are owned copies of the selected region.

use ndarray::Array;
use ndarray::ArrayBase;
use ndarray::ArrayD;
use ndarray::Data;
use ndarray::Dimension;
use ndarray::IxDyn;
use ndarray::Slice;

use crate::array::ArrayError;
use crate::array::ReflectPaddable;
use crate::array::TileArray;
use crate::array::check_ranges;
use crate::array::padded_shape;
use crate::array::source_coord;
use crate::range::Range;

impl<S, D> TileArray for ArrayBase<S, D>
where
    S: Data,
    S::Elem: Clone,
    D: Dimension,
{
    type Tile = Array<S::Elem, D>;

    fn shape(&self) -> &[usize] {
        ArrayBase::shape(self)
    }

    fn extract(&self, ranges: &[Range]) -> Result<Self::Tile, ArrayError> {
        check_ranges(ArrayBase::shape(self), ranges)?;
        let view = self.slice_each_axis(|axis| {
            let Range(begin, end, step) = ranges[axis.axis.index()];
            Slice::new(begin as isize, end.map(|end| end as isize), step as isize)
        });
        Ok(view.to_owned())
    }
}

impl<A, D> ReflectPaddable for Array<A, D>
where
    A: Clone,
    D: Dimension,
{
    fn reflect_pad(&self, padding: &[(usize, usize)]) -> Result<Self, ArrayError> {
        let shape = self.shape();
        let padded = padded_shape(shape, padding)?;
        let source = self.view().into_dyn();
        let result = ArrayD::from_shape_fn(IxDyn(&padded), |index| {
            let coord = source_coord(index.slice(), shape, padding);
            source[coord.as_slice()].clone()
        });
        Ok(result.into_dimensionality::<D>()?)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;
    use ndarray::Array3;
    use ndarray::array;

    use super::*;

    #[test]
    fn test_extract_copies_region() {
        let a = Array2::from_shape_fn((4, 6), |(i, j)| i * 10 + j);
        let tile = a
            .extract(&[Range::from(1..3), Range::from(2..5)])
            .unwrap();
        assert_eq!(tile, array![[12, 13, 14], [22, 23, 24]]);

        let strided = a.extract(&[Range::full(), Range(0, None, 2)]).unwrap();
        assert_eq!(strided.shape(), &[4, 3]);
        assert_eq!(strided[[3, 2]], 34);
    }

    #[test]
    fn test_extract_empty_and_invalid() {
        let a = Array2::<f32>::zeros((4, 4));
        let empty = a.extract(&[Range::from(4..4), Range::full()]).unwrap();
        assert_eq!(empty.shape(), &[0, 4]);

        assert!(matches!(
            a.extract(&[Range::from(0..5), Range::full()]),
            Err(ArrayError::RangeOutOfBounds { axis: 0, len: 4, .. })
        ));
        assert!(matches!(
            a.extract(&[Range::full()]),
            Err(ArrayError::RankMismatch { .. })
        ));
    }

    #[test]
    fn test_reflect_pad_matches_reflection() {
        let a = array![[1, 2, 3], [4, 5, 6]];
        let padded = a.reflect_pad(&[(1, 1), (2, 0)]).unwrap();
        assert_eq!(
            padded,
            array![
                [6, 5, 4, 5, 6],
                [3, 2, 1, 2, 3],
                [6, 5, 4, 5, 6],
                [3, 2, 1, 2, 3],
            ]
        );
    }

    #[test]
    fn test_reflect_pad_skips_channel_axis() {
        let a = Array3::from_shape_fn((2, 3, 3), |(c, i, j)| c * 100 + i * 3 + j);
        let padded = a.reflect_pad(&[(0, 0), (1, 1), (1, 1)]).unwrap();
        assert_eq!(padded.shape(), &[2, 5, 5]);
        // Corner of channel 1 mirrors element (1, 1) of that channel.
        assert_eq!(padded[[1, 0, 0]], 100 + 4);
        assert_eq!(padded[[0, 2, 2]], 4);
    }

    #[test]
    fn test_reflect_pad_dynamic_and_errors() {
        let a = ArrayD::from_shape_vec(IxDyn(&[3]), vec![1.0, 2.0, 3.0]).unwrap();
        let padded = a.reflect_pad(&[(2, 2)]).unwrap();
        assert_eq!(padded.as_slice().unwrap(), &[3.0, 2.0, 1.0, 2.0, 3.0, 2.0, 1.0]);

        let empty = Array2::<f32>::zeros((0, 3));
        assert!(matches!(
            empty.reflect_pad(&[(1, 0), (0, 0)]),
            Err(ArrayError::ReflectEmptyAxis { axis: 0, .. })
        ));
        assert!(matches!(
            a.reflect_pad(&[(1, 1), (0, 0)]),
            Err(ArrayError::RankMismatch { .. })
        ));
    }
}
