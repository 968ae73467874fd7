use std::fmt;

use enum_as_inner::EnumAsInner;
use serde::Deserialize;
use serde::Serialize;

/// A range over block indices, with optional and possibly negative
/// endpoints.
///
/// Unlike an ordinary half-open range, a block range resolves to an
/// *inclusive* pair of block indices `(first, last)`:
///
/// | endpoint     | resolves to               |
/// |--------------|---------------------------|
/// | no start     | `0`                       |
/// | start `s>=0` | `s`                       |
/// | start `s<0`  | `num_blocks + s`          |
/// | no stop      | `num_blocks - 1`          |
/// | stop `e>0`   | `e - 1`                   |
/// | stop `e<=0`  | `num_blocks + e - 1`      |
///
/// A stop of zero therefore means "through the last block".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRange {
    pub start: Option<isize>,
    pub stop: Option<isize>,
}

impl BlockRange {
    pub fn new(start: Option<isize>, stop: Option<isize>) -> Self {
        Self { start, stop }
    }

    /// Every block along the axis.
    pub fn full() -> Self {
        Self::new(None, None)
    }

    /// Resolve against an axis with `num_blocks` blocks, returning the
    /// inclusive `(first, last)` block indices. The result is not
    /// validated against the grid.
    pub fn resolve(&self, num_blocks: usize) -> (isize, isize) {
        let n = num_blocks as isize;
        let first = match self.start {
            None => 0,
            Some(start) if start >= 0 => start,
            Some(start) => n + start,
        };
        let last = match self.stop {
            None => n - 1,
            Some(stop) if stop > 0 => stop - 1,
            Some(stop) => n + stop - 1,
        };
        (first, last)
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(start) = self.start {
            write!(f, "{}", start)?;
        }
        write!(f, ":")?;
        if let Some(stop) = self.stop {
            write!(f, "{}", stop)?;
        }
        Ok(())
    }
}

impl From<std::ops::Range<isize>> for BlockRange {
    fn from(r: std::ops::Range<isize>) -> Self {
        Self::new(Some(r.start), Some(r.end))
    }
}

impl From<std::ops::RangeFrom<isize>> for BlockRange {
    fn from(r: std::ops::RangeFrom<isize>) -> Self {
        Self::new(Some(r.start), None)
    }
}

impl From<std::ops::RangeTo<isize>> for BlockRange {
    fn from(r: std::ops::RangeTo<isize>) -> Self {
        Self::new(None, Some(r.end))
    }
}

impl From<std::ops::RangeFull> for BlockRange {
    fn from(_: std::ops::RangeFull) -> Self {
        Self::full()
    }
}

/// One entry of a block coordinate tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumAsInner, Serialize, Deserialize)]
pub enum BlockCoord {
    /// An exact block index.
    Index(usize),
    /// A range of blocks.
    Range(BlockRange),
}

impl From<usize> for BlockCoord {
    fn from(index: usize) -> Self {
        BlockCoord::Index(index)
    }
}

impl From<BlockRange> for BlockCoord {
    fn from(range: BlockRange) -> Self {
        BlockCoord::Range(range)
    }
}

macro_rules! block_coord_from_range {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for BlockCoord {
                fn from(r: $ty) -> Self {
                    BlockCoord::Range(BlockRange::from(r))
                }
            }
        )*
    };
}

block_coord_from_range!(
    std::ops::Range<isize>,
    std::ops::RangeFrom<isize>,
    std::ops::RangeTo<isize>,
    std::ops::RangeFull
);

/// What to fetch from a [`crate::BlockIndexer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockSelector {
    /// A block range along the first spatial axis; every other spatial
    /// axis is taken whole.
    Axis(BlockRange),
    /// One coordinate per spatial axis, either all exact indices or all
    /// ranges.
    Coords(Vec<BlockCoord>),
}

impl From<BlockRange> for BlockSelector {
    fn from(range: BlockRange) -> Self {
        BlockSelector::Axis(range)
    }
}

macro_rules! block_selector_from_range {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for BlockSelector {
                fn from(r: $ty) -> Self {
                    BlockSelector::Axis(BlockRange::from(r))
                }
            }
        )*
    };
}

block_selector_from_range!(
    std::ops::Range<isize>,
    std::ops::RangeFrom<isize>,
    std::ops::RangeTo<isize>,
    std::ops::RangeFull
);

impl From<Vec<BlockCoord>> for BlockSelector {
    fn from(coords: Vec<BlockCoord>) -> Self {
        BlockSelector::Coords(coords)
    }
}

impl From<Vec<usize>> for BlockSelector {
    fn from(indices: Vec<usize>) -> Self {
        BlockSelector::Coords(indices.into_iter().map(BlockCoord::Index).collect())
    }
}

impl From<&[usize]> for BlockSelector {
    fn from(indices: &[usize]) -> Self {
        BlockSelector::from(indices.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for BlockSelector {
    fn from(indices: [usize; N]) -> Self {
        BlockSelector::from(indices.to_vec())
    }
}

impl<const N: usize> From<[BlockRange; N]> for BlockSelector {
    fn from(ranges: [BlockRange; N]) -> Self {
        BlockSelector::Coords(ranges.into_iter().map(BlockCoord::Range).collect())
    }
}

impl fmt::Display for BlockSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockSelector::Axis(range) => write!(f, "[{}]", range),
            BlockSelector::Coords(coords) => {
                write!(f, "[")?;
                for (i, coord) in coords.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match coord {
                        BlockCoord::Index(index) => write!(f, "{}", index)?,
                        BlockCoord::Range(range) => write!(f, "{}", range)?,
                    }
                }
                write!(f, "]")
            }
        }
    }
}

/// Build a [`BlockSelector`] from one block coordinate per spatial axis.
/// Each coordinate is either an exact block index or a block range.
///
/// ```
/// use ndtile::BlockRange;
/// use ndtile::BlockSelector;
/// use ndtile::blocks;
///
/// assert_eq!(blocks![1, 2], BlockSelector::from([1, 2]));
/// assert_eq!(
///     blocks![6..8, ..],
///     BlockSelector::from([BlockRange::from(6..8), BlockRange::full()])
/// );
/// ```
#[macro_export]
macro_rules! blocks {
    ( $( $coord:expr ),* $(,)? ) => {
        $crate::BlockSelector::Coords(vec![ $( $crate::BlockCoord::from($coord) ),* ])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        assert_eq!(BlockRange::full().resolve(8), (0, 7));
        assert_eq!(BlockRange::from(..-1).resolve(8), (0, 6));
        assert_eq!(BlockRange::from(6..8).resolve(8), (6, 7));
        assert_eq!(BlockRange::from(-2..).resolve(8), (6, 7));
        assert_eq!(BlockRange::from(-3..-1).resolve(8), (5, 6));
        assert_eq!(BlockRange::from(2..3).resolve(8), (2, 2));
        // A zero stop runs through the last block.
        assert_eq!(BlockRange::new(Some(1), Some(0)).resolve(8), (1, 7));
    }

    #[test]
    fn test_display() {
        assert_eq!(BlockRange::from(6..8).to_string(), "6:8");
        assert_eq!(BlockRange::from(..-1).to_string(), ":-1");
        assert_eq!(blocks![1, 2].to_string(), "[1, 2]");
        assert_eq!(blocks![6..8, ..].to_string(), "[6:8, :]");
        assert_eq!(BlockSelector::from(..-1).to_string(), "[:-1]");
    }

    #[test]
    fn test_conversions() {
        assert_eq!(
            blocks![3, 4],
            BlockSelector::Coords(vec![BlockCoord::Index(3), BlockCoord::Index(4)])
        );
        assert_eq!(BlockSelector::from(vec![3, 4]), blocks![3, 4]);
        assert_eq!(BlockSelector::from(&[3usize, 4][..]), blocks![3, 4]);
        assert_eq!(
            BlockSelector::from(2..),
            BlockSelector::Axis(BlockRange::new(Some(2), None))
        );
        let mixed = blocks![1, 0..2];
        let BlockSelector::Coords(coords) = mixed else {
            panic!("expected coordinates");
        };
        assert_eq!(coords[0].as_index(), Some(&1));
        assert_eq!(coords[1].as_range(), Some(&BlockRange::from(0..2)));
    }
}
