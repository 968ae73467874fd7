//! Block tiling for dense N-dimensional arrays.
//!
//! Provides [`BlockIndexer`], which cuts the spatial axes of an array into
//! fixed-size blocks and fetches tiles of one or more blocks. While a
//! [`HaloProvider`] is attached, each tile is extended by a halo rounded up
//! to whole blocks; context that falls outside the array is synthesized by
//! reflect padding. See [`BlockIndexer`] for more details.
//!
//! Arrays plug in through [`TileArray`] and [`ReflectPaddable`]. The crate
//! implements both for [`ndarray`] arrays, whose tiles are owned copies,
//! and for [`DenseTensor`], whose tiles are views sharing storage with the
//! source.

mod array;
pub use array::ArrayError;
pub use array::ReflectPaddable;
pub use array::TileArray;
pub use array::reflect_index;

/// Index ranges that clamp to an axis and record the padding they could
/// not satisfy.
pub mod range;

/// Strided layouts over a flat buffer.
pub mod layout;

mod dense;
mod nd;

/// Block shape policies, including shape codes parsed from text.
pub mod policy;

/// Block coordinates: which blocks of the grid a fetch should cover.
pub mod selector;

mod halo;
pub use halo::BlockProcessor;
pub use halo::Halo;
pub use halo::HaloProvider;
pub use halo::NoHalo;

mod indexer;
pub use indexer::AttachGuard;
pub use indexer::BlockIndexer;
pub use indexer::TileError;

/// Tiling configuration, loadable from serde formats or the
/// environment variables it reads.
pub mod config;

mod logging;
pub use logging::DEFAULT_LOG_FILTER;
pub use logging::NDTILE_LOG;
pub use logging::initialize_logging;

/// A tensor over shared storage whose tiles are views.
pub use dense::DenseTensor;
/// A range with optional end and step size.
pub use range::Range;
/// A range bounded to an axis, with its unsatisfied padding.
pub use range::BoundedRange;
/// The offset, sizes and strides of a tensor over a flat buffer.
pub use layout::Layout;
/// Errors that can occur while building or slicing a layout.
pub use layout::LayoutError;
pub use policy::BlockShapePolicy;
pub use policy::DynamicShape;
pub use policy::ShapeExprError;
pub use selector::BlockCoord;
pub use selector::BlockRange;
pub use selector::BlockSelector;
pub use config::ConfigError;
pub use config::TilingConfig;

#[cfg(test)]
mod strategy;
