// WarpSpeed Engine - segment.rs

use std::cmp::min;

use itertools::Itertools;

use crate::error::{EngineError, Result};

/// A contiguous byte range `[initial_start_position, end_position)` of a download.
///
/// `start_position` is the resume cursor: the next byte to request. It only
/// moves forward, through [`Segment::advance`], and never passes `end_position`.
/// Segments do no locking; the owning [`Downloader`](crate::downloader::Downloader)
/// guards them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    index: usize,
    initial_start_position: u64,
    start_position: u64,
    end_position: u64,
}

impl Segment {
    pub fn new(index: usize, start: u64, end: u64) -> Result<Self> {
        Self::restore(index, start, start, end)
    }

    /// Rebuilds a segment from saved positions, checking the bounds invariant.
    pub fn restore(index: usize, initial_start: u64, start: u64, end: u64) -> Result<Self> {
        if initial_start > start || start > end {
            return Err(EngineError::InvariantViolation(format!(
                "segment {index} has bounds {initial_start} <= {start} <= {end} violated"
            )));
        }
        Ok(Self {
            index,
            initial_start_position: initial_start,
            start_position: start,
            end_position: end,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn initial_start_position(&self) -> u64 {
        self.initial_start_position
    }

    pub fn start_position(&self) -> u64 {
        self.start_position
    }

    pub fn end_position(&self) -> u64 {
        self.end_position
    }

    pub fn len(&self) -> u64 {
        self.end_position - self.initial_start_position
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remaining(&self) -> u64 {
        self.end_position - self.start_position
    }

    pub fn downloaded(&self) -> u64 {
        self.start_position - self.initial_start_position
    }

    pub fn is_complete(&self) -> bool {
        self.start_position == self.end_position
    }

    /// Moves the resume cursor past `bytes` freshly written bytes.
    pub fn advance(&mut self, bytes: u64) -> Result<()> {
        if bytes > self.remaining() {
            return Err(EngineError::InvariantViolation(format!(
                "segment {} cannot advance {} bytes past {} (end {})",
                self.index, bytes, self.start_position, self.end_position
            )));
        }
        self.start_position += bytes;
        Ok(())
    }
}

/// Splits `[0, total_size)` into at most `requested` near-equal segments.
///
/// Resources without range support always get one segment, and no segment is
/// cut smaller than `min_segment_size` unless the whole file is. An empty file
/// yields a single, already complete segment.
pub fn plan_segments(
    total_size: u64,
    requested: usize,
    supports_ranges: bool,
    min_segment_size: u64,
) -> Vec<Segment> {
    let mut count = if supports_ranges { requested.max(1) as u64 } else { 1 };
    if min_segment_size > 0 {
        count = min(count, (total_size / min_segment_size).max(1));
    }
    if total_size == 0 {
        return vec![Segment {
            index: 0,
            initial_start_position: 0,
            start_position: 0,
            end_position: 0,
        }];
    }

    let segment_size = total_size.div_ceil(count);
    let mut segments = Vec::with_capacity(count as usize);
    let mut start = 0;
    for index in 0..count as usize {
        let end = min(start + segment_size, total_size);
        segments.push(Segment {
            index,
            initial_start_position: start,
            start_position: start,
            end_position: end,
        });
        start = end;
        if start >= total_size {
            break;
        }
    }
    segments
}

/// Checks that `segments` partition `[0, total_size)`: indices in order,
/// neighbours touching, no gaps or overlaps.
pub fn validate_partition(segments: &[Segment], total_size: u64) -> Result<()> {
    let (first, last) = match (segments.first(), segments.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return Err(EngineError::InvariantViolation(
                "a download needs at least one segment".to_string(),
            ))
        }
    };
    if first.initial_start_position != 0 || last.end_position != total_size {
        return Err(EngineError::InvariantViolation(format!(
            "segments cover [{}, {}) instead of [0, {})",
            first.initial_start_position, last.end_position, total_size
        )));
    }
    if let Some((position, segment)) = segments.iter().enumerate().find(|(i, s)| s.index != *i) {
        return Err(EngineError::InvariantViolation(format!(
            "segment at position {} carries index {}",
            position, segment.index
        )));
    }
    if let Some((left, right)) = segments
        .iter()
        .tuple_windows()
        .find(|(left, right)| left.end_position != right.initial_start_position)
    {
        return Err(EngineError::InvariantViolation(format!(
            "segments {} and {} are not contiguous ({} vs {})",
            left.index, right.index, left.end_position, right.initial_start_position
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_partition(segments: &[Segment], total: u64) {
        validate_partition(segments, total).expect("segments should partition the file");
    }

    #[test]
    fn advance_moves_cursor_and_completes() {
        let mut segment = Segment::new(0, 100, 200).unwrap();
        segment.advance(60).unwrap();
        assert_eq!(segment.start_position(), 160);
        assert_eq!(segment.remaining(), 40);
        assert_eq!(segment.downloaded(), 60);
        segment.advance(40).unwrap();
        assert!(segment.is_complete());
        assert_eq!(segment.remaining(), 0);
    }

    #[test]
    fn advance_past_end_is_rejected_and_leaves_segment_untouched() {
        let mut segment = Segment::new(3, 0, 10).unwrap();
        segment.advance(4).unwrap();
        let err = segment.advance(7).unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation(_)));
        assert_eq!(segment.start_position(), 4);
    }

    #[test]
    fn restore_rejects_broken_bounds() {
        assert!(Segment::restore(0, 10, 5, 20).is_err());
        assert!(Segment::restore(0, 0, 25, 20).is_err());
        let segment = Segment::restore(1, 1000, 1500, 2000).unwrap();
        assert_eq!(segment.initial_start_position(), 1000);
        assert_eq!(segment.start_position(), 1500);
    }

    #[test]
    fn plan_divides_evenly_with_remainder_in_last_segment() {
        let segments = plan_segments(2000, 2, true, 0);
        assert_eq!(segments.len(), 2);
        assert_eq!((segments[0].start_position(), segments[0].end_position()), (0, 1000));
        assert_eq!((segments[1].start_position(), segments[1].end_position()), (1000, 2000));

        let segments = plan_segments(1001, 4, true, 0);
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[3].end_position(), 1001);
        assert_partition(&segments, 1001);
    }

    #[test]
    fn plan_uses_single_segment_without_range_support() {
        let segments = plan_segments(5000, 8, false, 0);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].end_position(), 5000);
    }

    #[test]
    fn plan_respects_minimum_segment_size() {
        let segments = plan_segments(10_000, 16, true, 4096);
        assert_eq!(segments.len(), 2);
        assert_partition(&segments, 10_000);

        let segments = plan_segments(100, 16, true, 4096);
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn plan_never_leaves_gaps_for_awkward_sizes() {
        for total in [1u64, 7, 10, 99, 1023, 65_537] {
            for requested in 1..=9 {
                let segments = plan_segments(total, requested, true, 0);
                assert!(segments.len() <= requested);
                assert_partition(&segments, total);
            }
        }
    }

    #[test]
    fn plan_for_empty_file_is_already_complete() {
        let segments = plan_segments(0, 4, true, 0);
        assert_eq!(segments.len(), 1);
        assert!(segments[0].is_complete());
        assert_partition(&segments, 0);
    }

    #[test]
    fn partition_check_catches_gaps_and_bad_indices() {
        let gap = vec![
            Segment::new(0, 0, 100).unwrap(),
            Segment::new(1, 150, 200).unwrap(),
        ];
        assert!(validate_partition(&gap, 200).is_err());

        let reordered = vec![
            Segment::new(1, 0, 100).unwrap(),
            Segment::new(0, 100, 200).unwrap(),
        ];
        assert!(validate_partition(&reordered, 200).is_err());

        let short = vec![Segment::new(0, 0, 100).unwrap()];
        assert!(validate_partition(&short, 200).is_err());
        assert!(validate_partition(&[], 0).is_err());
    }
}
