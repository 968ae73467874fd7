//! Proptest generators shared by the unit tests.

use proptest::prelude::*;

/// Generates `(len, start, stop, before, after)` with
/// `0 <= start <= stop <= len <= max_len` and paddings up to `max_pad`.
pub fn gen_axis_request(
    max_len: usize,
    max_pad: usize,
) -> impl Strategy<Value = (usize, usize, usize, usize, usize)> {
    (0..=max_len).prop_flat_map(move |len| {
        (0..=len).prop_flat_map(move |start| {
            (
                Just(len),
                Just(start),
                start..=len,
                0..=max_pad,
                0..=max_pad,
            )
        })
    })
}

/// Generates a block shape together with a block count per axis, both of
/// rank `1..=max_rank`.
pub fn gen_block_grid(
    max_rank: usize,
    max_blocks: usize,
    max_block: usize,
) -> impl Strategy<Value = (Vec<usize>, Vec<usize>)> {
    (1..=max_rank).prop_flat_map(move |rank| {
        (
            prop::collection::vec(1..=max_block, rank),
            prop::collection::vec(1..=max_blocks, rank),
        )
    })
}

/// Generates a non-empty array shape together with per-axis
/// `(before, after)` padding.
pub fn gen_padded_shape(
    max_rank: usize,
    max_dim: usize,
    max_pad: usize,
) -> impl Strategy<Value = (Vec<usize>, Vec<(usize, usize)>)> {
    (1..=max_rank).prop_flat_map(move |rank| {
        (
            prop::collection::vec(1..=max_dim, rank),
            prop::collection::vec((0..=max_pad, 0..=max_pad), rank),
        )
    })
}
