use serde::Deserialize;
use serde::Serialize;

/// Something that asks for context around each block it is given, such as
/// a model whose receptive field reaches past the block boundary.
pub trait HaloProvider {
    /// Per-spatial-axis halo width, in array indices. `None` means no halo.
    fn halo(&self) -> Option<Vec<usize>>;
}

/// A fixed halo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Halo(pub Vec<usize>);

impl HaloProvider for Halo {
    fn halo(&self) -> Option<Vec<usize>> {
        Some(self.0.clone())
    }
}

/// A provider that never asks for a halo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoHalo;

impl HaloProvider for NoHalo {
    fn halo(&self) -> Option<Vec<usize>> {
        None
    }
}

/// A per-block processing step. The processor's halo is attached while
/// its tile is fetched, so the tile it receives carries the context it
/// asked for.
pub trait BlockProcessor<T>: HaloProvider {
    type Output;

    fn process(&self, tile: T) -> anyhow::Result<Self::Output>;
}
