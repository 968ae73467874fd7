use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// A range of indices, with a stride. Ranges are convertible from
/// native Rust ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range(pub usize, pub Option<usize>, pub usize);

impl Range {
    /// The whole axis, with unit stride.
    pub fn full() -> Self {
        Range(0, None, 1)
    }

    /// Resolve this range against an axis of the given size, returning
    /// `(begin, end, stride)` with `end` capped at `size`.
    pub fn resolve(&self, size: usize) -> (usize, usize, usize) {
        match self {
            Range(begin, Some(end), stride) => (*begin, std::cmp::min(size, *end), *stride),
            Range(begin, None, stride) => (*begin, size, *stride),
        }
    }

    /// The number of indices this range selects from an axis of the
    /// given size.
    pub fn len_within(&self, size: usize) -> usize {
        let (begin, end, stride) = self.resolve(size);
        end.saturating_sub(begin).div_ceil(stride.max(1))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Range(begin, Some(end), _) if end <= begin)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Range(begin, None, stride) => write!(f, "{}::{}", begin, stride),
            Range(begin, Some(end), stride) => write!(f, "{}:{}:{}", begin, end, stride),
        }
    }
}

impl From<std::ops::Range<usize>> for Range {
    fn from(r: std::ops::Range<usize>) -> Self {
        Self(r.start, Some(r.end), 1)
    }
}

impl From<std::ops::RangeInclusive<usize>> for Range {
    fn from(r: std::ops::RangeInclusive<usize>) -> Self {
        Self(*r.start(), Some(*r.end() + 1), 1)
    }
}

impl From<std::ops::RangeFrom<usize>> for Range {
    fn from(r: std::ops::RangeFrom<usize>) -> Self {
        Self(r.start, None, 1)
    }
}

impl From<std::ops::RangeFull> for Range {
    fn from(_: std::ops::RangeFull) -> Self {
        Self::full()
    }
}

impl From<usize> for Range {
    fn from(idx: usize) -> Self {
        Self(idx, Some(idx + 1), 1)
    }
}

/// A single-axis index range that knows how much padding was asked for
/// around it, and how much of that padding the axis could not supply.
///
/// Given a request for `[start, stop)` padded by `(before, after)` on an
/// axis of length `L`, the bounded range is the request extended by the
/// padding and clamped to `[0, L]`. Whatever was cut off by the clamp is
/// reported as the *residual padding*, which has to be synthesized (by
/// reflection, for example) rather than read from the array.
///
/// Without an axis length the range is "unbounded": it keeps the raw
/// request and reports no residual padding.
///
/// ```
/// use ndtile::BoundedRange;
///
/// let r = BoundedRange::bounded(0..32, (32, 32), 256);
/// assert_eq!((r.start(), r.stop()), (Some(0), Some(64)));
/// assert_eq!(r.residual_padding(), (32, 0));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundedRange {
    requested_start: Option<usize>,
    requested_stop: Option<usize>,
    step: Option<usize>,
    requested_padding: (usize, usize),
    axis_len: Option<usize>,
    start: Option<usize>,
    stop: Option<usize>,
    residual: (usize, usize),
}

impl BoundedRange {
    /// Create a range from a raw request. When `axis_len` is known, the
    /// padded request is clamped to the axis; otherwise it is kept as is.
    pub fn new(
        start: Option<usize>,
        stop: Option<usize>,
        step: Option<usize>,
        padding: (usize, usize),
        axis_len: Option<usize>,
    ) -> Self {
        let Some(len) = axis_len else {
            return Self {
                requested_start: start,
                requested_stop: stop,
                step,
                requested_padding: padding,
                axis_len,
                start,
                stop,
                residual: (0, 0),
            };
        };

        let (before, after) = padding;
        let begin = start.unwrap_or(0);
        let end = stop.unwrap_or(len);

        let (clamped_start, residual_before) = match begin.checked_sub(before) {
            Some(begin) => (begin, 0),
            None => (0, before - begin),
        };
        let padded_stop = end + after;
        let (clamped_stop, residual_after) = if padded_stop > len {
            (len, padded_stop - len)
        } else {
            (padded_stop, 0)
        };

        Self {
            requested_start: start,
            requested_stop: stop,
            step,
            requested_padding: padding,
            axis_len,
            // A request that begins past the end of the axis collapses to
            // an empty range at the end.
            start: Some(clamped_start.min(clamped_stop)),
            stop: Some(clamped_stop),
            residual: (residual_before, residual_after),
        }
    }

    /// A range with no known bounds: the request is used verbatim.
    pub fn unbounded(start: Option<usize>, stop: Option<usize>, step: Option<usize>) -> Self {
        Self::new(start, stop, step, (0, 0), None)
    }

    /// Clamp `range`, padded by `padding`, to an axis of length `axis_len`.
    pub fn bounded(range: std::ops::Range<usize>, padding: (usize, usize), axis_len: usize) -> Self {
        Self::new(
            Some(range.start),
            Some(range.end),
            None,
            padding,
            Some(axis_len),
        )
    }

    /// Start of the in-bounds range.
    pub fn start(&self) -> Option<usize> {
        self.start
    }

    /// Stop (exclusive) of the in-bounds range.
    pub fn stop(&self) -> Option<usize> {
        self.stop
    }

    pub fn step(&self) -> Option<usize> {
        self.step
    }

    pub fn axis_len(&self) -> Option<usize> {
        self.axis_len
    }

    pub fn requested_padding(&self) -> (usize, usize) {
        self.requested_padding
    }

    /// The `(before, after)` padding that fell outside the axis.
    pub fn residual_padding(&self) -> (usize, usize) {
        self.residual
    }

    /// Whether any padding must be synthesized for this axis.
    pub fn needs_padding(&self) -> bool {
        self.residual != (0, 0)
    }

    /// The range as originally requested, without padding or clamping.
    pub fn requested(&self) -> Range {
        Range(
            self.requested_start.unwrap_or(0),
            self.requested_stop,
            self.step.unwrap_or(1),
        )
    }

    /// The in-bounds range, suitable for slicing the underlying array.
    pub fn range(&self) -> Range {
        Range(self.start.unwrap_or(0), self.stop, self.step.unwrap_or(1))
    }

    /// Number of indices covered by the in-bounds range, if known.
    pub fn len(&self) -> Option<usize> {
        self.stop
            .or(self.axis_len)
            .map(|stop| self.range().len_within(stop))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}

impl fmt::Display for BoundedRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<usize>| v.map_or_else(|| "_".to_string(), |v| v.to_string());
        write!(
            f,
            "{}:{}/{}:{} + ({}, {})",
            show(self.start),
            show(self.stop),
            show(self.axis_len),
            show(self.step),
            self.residual.0,
            self.residual.1
        )
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::strategy::gen_axis_request;

    #[test]
    fn test_range_display() {
        assert_eq!(Range::from(3..5).to_string(), "3:5:1");
        assert_eq!(Range::from(3..).to_string(), "3::1");
        assert_eq!(Range::from(..).to_string(), "0::1");
        assert_eq!(Range::from(4), Range(4, Some(5), 1));
        assert_eq!(Range::from(2..=4), Range(2, Some(5), 1));
    }

    #[test]
    fn test_range_len_within() {
        assert_eq!(Range::full().len_within(7), 7);
        assert_eq!(Range(1, Some(6), 2).len_within(10), 3);
        assert_eq!(Range(4, Some(20), 1).len_within(10), 6);
        assert_eq!(Range(12, None, 1).len_within(10), 0);
        assert!(Range(3, Some(3), 1).is_empty());
    }

    #[test]
    fn test_unbounded_is_verbatim() {
        let r = BoundedRange::unbounded(Some(3), None, Some(2));
        assert_eq!(r.start(), Some(3));
        assert_eq!(r.stop(), None);
        assert_eq!(r.step(), Some(2));
        assert_eq!(r.residual_padding(), (0, 0));
        assert_eq!(r.range(), r.requested());

        let r = BoundedRange::new(None, None, None, (4, 4), None);
        assert_eq!(r.start(), None);
        assert_eq!(r.residual_padding(), (0, 0));
        assert_eq!(r.requested_padding(), (4, 4));
        assert_eq!(r.len(), None);
    }

    #[test]
    fn test_bounded_defaults() {
        let r = BoundedRange::new(None, None, None, (0, 0), Some(10));
        assert_eq!((r.start(), r.stop()), (Some(0), Some(10)));
        assert_eq!(r.len(), Some(10));
        assert!(!r.needs_padding());
    }

    #[test]
    fn test_bounded_interior() {
        let r = BoundedRange::bounded(64..96, (32, 32), 256);
        assert_eq!((r.start(), r.stop()), (Some(32), Some(128)));
        assert_eq!(r.residual_padding(), (0, 0));
        assert_eq!(r.range(), Range(32, Some(128), 1));
        assert_eq!(r.requested(), Range(64, Some(96), 1));
    }

    #[test]
    fn test_bounded_clamps_both_sides() {
        let r = BoundedRange::bounded(192..256, (32, 32), 256);
        assert_eq!((r.start(), r.stop()), (Some(160), Some(256)));
        assert_eq!(r.residual_padding(), (0, 32));

        let r = BoundedRange::bounded(2..4, (5, 5), 6);
        assert_eq!((r.start(), r.stop()), (Some(0), Some(6)));
        assert_eq!(r.residual_padding(), (3, 3));
        assert_eq!(r.to_string(), "0:6/6:_ + (3, 3)");
    }

    #[test]
    fn test_bounded_empty_is_legal() {
        let r = BoundedRange::bounded(0..0, (3, 0), 0);
        assert_eq!((r.start(), r.stop()), (Some(0), Some(0)));
        assert_eq!(r.residual_padding(), (3, 0));
        assert!(r.is_empty());

        let r = BoundedRange::bounded(4..4, (0, 0), 4);
        assert_eq!((r.start(), r.stop()), (Some(4), Some(4)));
        assert!(r.is_empty());
    }

    #[test]
    fn test_bounded_start_past_end() {
        let r = BoundedRange::bounded(300..310, (0, 0), 256);
        assert_eq!((r.start(), r.stop()), (Some(256), Some(256)));
        assert_eq!(r.residual_padding(), (0, 54));
    }

    #[test]
    fn test_step_passes_through() {
        let r = BoundedRange::new(Some(2), Some(8), Some(3), (4, 4), Some(10));
        assert_eq!(r.step(), Some(3));
        assert_eq!(r.range(), Range(0, Some(10), 3));
        assert_eq!(r.residual_padding(), (2, 2));
        assert_eq!(r.len(), Some(4));
    }

    proptest! {
        #[test]
        fn bounded_range_reconstructs_request(
            (len, start, stop, before, after) in gen_axis_request(512, 128)
        ) {
            let r = BoundedRange::bounded(start..stop, (before, after), len);
            let clamped_start = r.start().unwrap();
            let clamped_stop = r.stop().unwrap();
            let (residual_before, residual_after) = r.residual_padding();

            prop_assert!(clamped_start <= clamped_stop);
            prop_assert!(clamped_stop <= len);
            prop_assert_eq!(
                clamped_start as isize - residual_before as isize,
                start as isize - before as isize
            );
            prop_assert_eq!(clamped_stop + residual_after, stop + after);
        }
    }
}
