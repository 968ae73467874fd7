//! The block indexer: maps block coordinates to padded tiles.

use std::fmt;
use std::iter;
use std::ops::Deref;
use std::ops::DerefMut;
use std::sync::Arc;

use itertools::izip;

use crate::array::ArrayError;
use crate::array::ReflectPaddable;
use crate::array::TileArray;
use crate::config::ConfigError;
use crate::config::TilingConfig;
use crate::halo::BlockProcessor;
use crate::halo::HaloProvider;
use crate::layout::Coordinates;
use crate::policy::BlockShapePolicy;
use crate::range::BoundedRange;
use crate::range::Range;
use crate::selector::BlockCoord;
use crate::selector::BlockRange;
use crate::selector::BlockSelector;

#[derive(Debug, thiserror::Error)]
pub enum TileError {
    #[error("{channel_axes} channel axes exceed array rank {rank}")]
    ChannelAxesExceedRank { channel_axes: usize, rank: usize },

    #[error("block shape {block_shape:?} does not match spatial rank {spatial_rank}")]
    BlockRankMismatch {
        block_shape: Vec<usize>,
        spatial_rank: usize,
    },

    #[error("block size on axis {axis} must be positive")]
    ZeroBlockSize { axis: usize },

    #[error("spatial extent {extent} on axis {axis} is not a multiple of block size {block_size}")]
    IndivisibleExtent {
        axis: usize,
        extent: usize,
        block_size: usize,
    },

    #[error("selector {selector} has {actual} coordinates, expected {expected}")]
    SelectorRankMismatch {
        selector: BlockSelector,
        expected: usize,
        actual: usize,
    },

    #[error("selector {selector} mixes block indices and block ranges")]
    MixedCoordinates { selector: BlockSelector },

    #[error("block {index} out of range for axis {axis} with {num_blocks} blocks")]
    BlockOutOfRange {
        index: usize,
        axis: usize,
        num_blocks: usize,
    },

    #[error("block range {range} starts before the first block of axis {axis} with {num_blocks} blocks")]
    BlockRangeOutOfBounds {
        range: BlockRange,
        axis: usize,
        num_blocks: usize,
    },

    #[error("halo {halo:?} does not match spatial rank {spatial_rank}")]
    HaloRankMismatch { halo: Vec<usize>, spatial_rank: usize },

    #[error(transparent)]
    Array(#[from] ArrayError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("block processor failed: {0:#}")]
    Processor(anyhow::Error),
}

/// Cuts an array into fixed-size blocks over its spatial axes.
///
/// The leading `channel_axes` axes of the array are never partitioned or
/// padded; the remaining (spatial) axes are divided into blocks of the
/// shape given by a [`BlockShapePolicy`]. A trailing region smaller than a
/// block is not covered by any block.
///
/// While a [`HaloProvider`] is attached (see [`BlockIndexer::attach`]),
/// every fetched tile is extended on each side by the provider's halo,
/// rounded up to a whole number of blocks. Where that margin lies outside
/// the array it is synthesized by reflection.
///
/// ```
/// use std::sync::Arc;
///
/// use ndarray::Array2;
/// use ndtile::BlockIndexer;
/// use ndtile::Halo;
/// use ndtile::blocks;
///
/// let data = Array2::<f32>::zeros((256, 256));
/// let mut indexer = BlockIndexer::new(&data, [32, 32], 0).unwrap();
/// assert_eq!(indexer.num_blocks(), vec![8, 8]);
/// assert_eq!(indexer.fetch(..-1).unwrap().shape(), &[224, 256]);
///
/// let guard = indexer.attach(Arc::new(Halo(vec![4, 4])));
/// assert_eq!(guard.fetch(blocks![6..8, 0..2]).unwrap().shape(), &[128, 128]);
/// ```
pub struct BlockIndexer<'a, A: TileArray + ?Sized> {
    array: &'a A,
    channel_axes: usize,
    block_shape: Vec<usize>,
    provider: Option<Arc<dyn HaloProvider>>,
}

impl<'a, A: TileArray + ?Sized> BlockIndexer<'a, A> {
    /// Create an indexer over `array`, reading the block shape from
    /// `policy`. Spatial extents that are not a multiple of the block size
    /// are truncated, with a warning.
    pub fn new(
        array: &'a A,
        policy: impl BlockShapePolicy,
        channel_axes: usize,
    ) -> Result<Self, TileError> {
        Self::build(array, policy.block_shape(), channel_axes, false)
    }

    /// Create an indexer configured by `config`.
    pub fn from_config(array: &'a A, config: &TilingConfig) -> Result<Self, TileError> {
        let policy = config.block_shape_policy()?;
        Self::build(
            array,
            policy.block_shape(),
            config.channel_axes,
            config.require_divisible,
        )
    }

    fn build(
        array: &'a A,
        block_shape: Vec<usize>,
        channel_axes: usize,
        require_divisible: bool,
    ) -> Result<Self, TileError> {
        let rank = array.shape().len();
        if channel_axes > rank {
            return Err(TileError::ChannelAxesExceedRank { channel_axes, rank });
        }
        let spatial_shape = &array.shape()[channel_axes..];
        if block_shape.len() != spatial_shape.len() {
            return Err(TileError::BlockRankMismatch {
                spatial_rank: spatial_shape.len(),
                block_shape,
            });
        }
        if let Some(axis) = block_shape.iter().position(|&size| size == 0) {
            return Err(TileError::ZeroBlockSize { axis });
        }
        for (axis, (&extent, &block_size)) in spatial_shape.iter().zip(&block_shape).enumerate() {
            if extent % block_size == 0 {
                continue;
            }
            if require_divisible {
                return Err(TileError::IndivisibleExtent {
                    axis,
                    extent,
                    block_size,
                });
            }
            tracing::warn!(
                "spatial axis {} of extent {} is not a multiple of block size {}; \
                 the trailing {} indices are not covered by any block",
                axis,
                extent,
                block_size,
                extent % block_size
            );
        }

        Ok(Self {
            array,
            channel_axes,
            block_shape,
            provider: None,
        })
    }

    /// The array being tiled.
    pub fn array(&self) -> &'a A {
        self.array
    }

    pub fn channel_axes(&self) -> usize {
        self.channel_axes
    }

    pub fn block_shape(&self) -> &[usize] {
        &self.block_shape
    }

    /// The shape of the array without its channel axes.
    pub fn spatial_shape(&self) -> &[usize] {
        &self.array.shape()[self.channel_axes..]
    }

    /// The number of whole blocks along each spatial axis.
    pub fn num_blocks(&self) -> Vec<usize> {
        self.spatial_shape()
            .iter()
            .zip(&self.block_shape)
            .map(|(extent, size)| extent / size)
            .collect()
    }

    /// Every block coordinate of the grid, in row-major order.
    pub fn block_coords(&self) -> Coordinates {
        Coordinates::new(self.num_blocks())
    }

    /// The index range covered by the given block along each spatial axis.
    /// Coordinates are not checked against the block grid.
    pub fn block_slice(&self, block: &[usize]) -> Vec<std::ops::Range<usize>> {
        block
            .iter()
            .zip(&self.block_shape)
            .map(|(&index, &size)| size * index..size * (index + 1))
            .collect()
    }

    /// Resolve a selector to one index range per spatial axis. Exact
    /// block indices must lie on the grid. Block ranges may reach past the
    /// grid, where they clamp to the axis, and may be empty.
    pub fn index_ranges(
        &self,
        selector: &BlockSelector,
    ) -> Result<Vec<std::ops::Range<usize>>, TileError> {
        let spatial_rank = self.block_shape.len();
        let coords = match selector {
            BlockSelector::Axis(_) if spatial_rank == 0 => {
                return Err(TileError::SelectorRankMismatch {
                    selector: selector.clone(),
                    expected: 0,
                    actual: 1,
                });
            }
            BlockSelector::Axis(range) => {
                let mut coords = vec![BlockCoord::Range(*range)];
                coords.resize(spatial_rank, BlockCoord::Range(BlockRange::full()));
                coords
            }
            BlockSelector::Coords(coords) => coords.clone(),
        };
        if coords.len() != spatial_rank {
            return Err(TileError::SelectorRankMismatch {
                selector: selector.clone(),
                expected: spatial_rank,
                actual: coords.len(),
            });
        }
        let num_blocks = self.num_blocks();

        if let Some(indices) = coords
            .iter()
            .map(|coord| coord.as_index().copied())
            .collect::<Option<Vec<_>>>()
        {
            for (axis, (&index, &num_blocks)) in indices.iter().zip(&num_blocks).enumerate() {
                if index >= num_blocks {
                    return Err(TileError::BlockOutOfRange {
                        index,
                        axis,
                        num_blocks,
                    });
                }
            }
            return Ok(self.block_slice(&indices));
        }

        if let Some(ranges) = coords
            .iter()
            .map(|coord| coord.as_range().copied())
            .collect::<Option<Vec<_>>>()
        {
            let mut firsts = Vec::with_capacity(spatial_rank);
            let mut stops = Vec::with_capacity(spatial_rank);
            for (axis, (range, &num_blocks)) in ranges.iter().zip(&num_blocks).enumerate() {
                let (first, last) = range.resolve(num_blocks);
                if first < 0 {
                    return Err(TileError::BlockRangeOutOfBounds {
                        range: *range,
                        axis,
                        num_blocks,
                    });
                }
                firsts.push(first as usize);
                // Exclusive; a backwards range selects no blocks.
                stops.push((last + 1).max(first) as usize);
            }
            // Ranges past the grid clamp to the axis instead of failing.
            return Ok(izip!(
                self.block_slice(&firsts),
                self.block_slice(&stops),
                self.spatial_shape()
            )
            .map(|(first, stop, &extent)| first.start..stop.start.min(extent).max(first.start))
            .collect());
        }

        Err(TileError::MixedCoordinates {
            selector: selector.clone(),
        })
    }

    /// The padding applied before and after each spatial axis of a tile:
    /// the attached halo rounded up to whole blocks, or zero when nothing
    /// is attached.
    pub fn halo_padding(&self) -> Result<Vec<usize>, TileError> {
        let spatial_rank = self.block_shape.len();
        let Some(halo) = self.provider.as_ref().and_then(|provider| provider.halo()) else {
            return Ok(vec![0; spatial_rank]);
        };
        if halo.len() != spatial_rank {
            return Err(TileError::HaloRankMismatch { halo, spatial_rank });
        }
        Ok(halo
            .iter()
            .zip(&self.block_shape)
            .map(|(&width, &size)| width.div_ceil(size) * size)
            .collect())
    }

    /// Fetch the tile selected by `selector`, padded by the attached halo.
    pub fn fetch(&self, selector: impl Into<BlockSelector>) -> Result<A::Tile, TileError> {
        let selector = selector.into();
        let index_ranges = self.index_ranges(&selector)?;
        let padding = self.halo_padding()?;

        let bounded: Vec<BoundedRange> = izip!(index_ranges, &padding, self.spatial_shape())
            .map(|(range, &pad, &len)| BoundedRange::bounded(range, (pad, pad), len))
            .collect();
        let ranges: Vec<Range> = iter::repeat(Range::full())
            .take(self.channel_axes)
            .chain(bounded.iter().map(BoundedRange::range))
            .collect();
        let residual: Vec<(usize, usize)> = iter::repeat((0, 0))
            .take(self.channel_axes)
            .chain(bounded.iter().map(BoundedRange::residual_padding))
            .collect();

        tracing::debug!(
            "fetch {}: ranges {:?}, residual padding {:?}",
            selector,
            ranges,
            residual
        );
        let tile = self.array.extract(&ranges)?;
        if bounded.iter().any(BoundedRange::needs_padding) {
            Ok(tile.reflect_pad(&residual)?)
        } else {
            Ok(tile)
        }
    }

    /// Whether a halo provider is currently attached.
    pub fn is_attached(&self) -> bool {
        self.provider.is_some()
    }

    /// Attach `provider` until the returned guard is dropped. The guard
    /// dereferences to the indexer. On drop, whatever was attached before
    /// is restored, so nested attachments unwind in order.
    pub fn attach(&mut self, provider: Arc<dyn HaloProvider>) -> AttachGuard<'_, 'a, A> {
        let previous = self.provider.replace(provider);
        AttachGuard {
            indexer: self,
            previous,
        }
    }

    /// Run `f` with `provider` attached. The attachment is undone when `f`
    /// returns or unwinds.
    pub fn with_halo_provider<R>(
        &mut self,
        provider: Arc<dyn HaloProvider>,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let mut guard = self.attach(provider);
        f(&mut *guard)
    }

    /// Fetch the selected tile with `processor` attached, then hand the
    /// tile to the processor.
    pub fn process_block<P>(
        &mut self,
        processor: Arc<P>,
        selector: impl Into<BlockSelector>,
    ) -> Result<P::Output, TileError>
    where
        P: BlockProcessor<A::Tile> + 'static,
    {
        let provider: Arc<dyn HaloProvider> = processor.clone();
        let tile = self.with_halo_provider(provider, |indexer| indexer.fetch(selector))?;
        processor.process(tile).map_err(TileError::Processor)
    }
}

impl<A: TileArray + ?Sized> fmt::Debug for BlockIndexer<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockIndexer")
            .field("shape", &self.array.shape())
            .field("channel_axes", &self.channel_axes)
            .field("block_shape", &self.block_shape)
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Keeps a halo provider attached to a [`BlockIndexer`]; see
/// [`BlockIndexer::attach`].
pub struct AttachGuard<'i, 'a, A: TileArray + ?Sized> {
    indexer: &'i mut BlockIndexer<'a, A>,
    previous: Option<Arc<dyn HaloProvider>>,
}

impl<'a, A: TileArray + ?Sized> Deref for AttachGuard<'_, 'a, A> {
    type Target = BlockIndexer<'a, A>;

    fn deref(&self) -> &Self::Target {
        self.indexer
    }
}

impl<A: TileArray + ?Sized> DerefMut for AttachGuard<'_, '_, A> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.indexer
    }
}

impl<A: TileArray + ?Sized> Drop for AttachGuard<'_, '_, A> {
    fn drop(&mut self) {
        self.indexer.provider = self.previous.take();
    }
}

impl<A: TileArray + ?Sized> fmt::Debug for AttachGuard<'_, '_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachGuard")
            .field("indexer", &self.indexer)
            .field("restores_previous", &self.previous.is_some())
            .finish()
    }
}
