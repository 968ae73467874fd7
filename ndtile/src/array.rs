//! Capability interfaces the tiling core requires from array backends.
//!
//! The indexer never inspects the concrete type of the array it tiles.
//! Instead, an array type opts in by implementing [`TileArray`], whose
//! tiles implement [`ReflectPaddable`]. Supporting a new array type means
//! implementing these two traits for it. Both are implemented here for
//! `ndarray` arrays and for [`crate::DenseTensor`].

use crate::layout::LayoutError;
use crate::range::Range;

#[derive(Debug, thiserror::Error)]
pub enum ArrayError {
    #[error("expected {expected} dimensions, got {actual}")]
    RankMismatch { expected: usize, actual: usize },

    #[error("cannot reflect-pad axis {axis} of length 0 by {padding:?}")]
    ReflectEmptyAxis { axis: usize, padding: (usize, usize) },

    #[error("range {range} out of bounds for axis {axis} of length {len}")]
    RangeOutOfBounds { range: Range, axis: usize, len: usize },

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

/// An array that can be cut into tiles.
pub trait TileArray {
    /// The array type produced by [`TileArray::extract`]. It may be a copy
    /// or a view, depending on the backend.
    type Tile: ReflectPaddable;

    /// The full shape of the array, channel axes included.
    fn shape(&self) -> &[usize];

    /// Extract the region selected by one range per axis. Every range must
    /// lie within its axis.
    fn extract(&self, ranges: &[Range]) -> Result<Self::Tile, ArrayError>;
}

/// An array that can be extended by reflecting its borders.
pub trait ReflectPaddable: Sized {
    /// Return a new array of the same rank where axis `i` is extended by
    /// `padding[i].0` elements before and `padding[i].1` elements after,
    /// mirrored around (and excluding) the border element.
    fn reflect_pad(&self, padding: &[(usize, usize)]) -> Result<Self, ArrayError>;
}

/// Map index `i` of a padded axis back to the source axis of length
/// `len`, given `before` elements of padding in front.
///
/// The mapping mirrors without repeating the edge, and keeps mirroring
/// when the padding is wider than the axis: for `len = 4`, indices
/// `-3..7` relative to the source map to `3 2 1 | 0 1 2 3 | 2 1 0`.
pub fn reflect_index(i: usize, before: usize, len: usize) -> usize {
    debug_assert!(len > 0);
    if len == 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let shifted = (i + period * before.div_ceil(period)) - before;
    let folded = shifted % period;
    if folded >= len {
        period - folded
    } else {
        folded
    }
}

/// Validate `padding` against `shape` and return the padded shape.
pub(crate) fn padded_shape(
    shape: &[usize],
    padding: &[(usize, usize)],
) -> Result<Vec<usize>, ArrayError> {
    if padding.len() != shape.len() {
        return Err(ArrayError::RankMismatch {
            expected: shape.len(),
            actual: padding.len(),
        });
    }
    shape
        .iter()
        .zip(padding)
        .enumerate()
        .map(|(axis, (&len, &(before, after)))| {
            if len == 0 && before + after > 0 {
                return Err(ArrayError::ReflectEmptyAxis {
                    axis,
                    padding: (before, after),
                });
            }
            Ok(before + len + after)
        })
        .collect()
}

/// Map a coordinate of the padded array to the source coordinate.
pub(crate) fn source_coord(
    padded: &[usize],
    shape: &[usize],
    padding: &[(usize, usize)],
) -> Vec<usize> {
    padded
        .iter()
        .zip(shape)
        .zip(padding)
        .map(|((&i, &len), &(before, _))| reflect_index(i, before, len))
        .collect()
}

/// Check that `ranges` can be extracted from an array of `shape`.
pub(crate) fn check_ranges(shape: &[usize], ranges: &[Range]) -> Result<(), ArrayError> {
    if ranges.len() != shape.len() {
        return Err(ArrayError::RankMismatch {
            expected: shape.len(),
            actual: ranges.len(),
        });
    }
    for (axis, (range, &len)) in ranges.iter().zip(shape).enumerate() {
        let Range(begin, end, step) = *range;
        let end_ok = end.map_or(true, |end| begin <= end && end <= len);
        if begin > len || !end_ok || step == 0 {
            return Err(ArrayError::RangeOutOfBounds {
                range: *range,
                axis,
                len,
            });
        }
    }
    Ok(())
}
