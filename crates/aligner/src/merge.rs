//! StreamAligner - merges per-eye measurement sequences into dense records.

use contracts::{OutputRecord, PupilMeasurement, TrackingFrame};
use tracing::{debug, warn};

/// Aligns left/right measurement streams by frame index
pub struct StreamAligner;

impl StreamAligner {
    /// Two-pointer merge of two gappy, increasing sequences
    ///
    /// Emits one record per index in `0..=max(last left, last right)`. A side
    /// advances only when its next element matches the current index;
    /// otherwise that side is absent for this index. Entries behind the
    /// current index (duplicates or out of order) are skipped with a warning.
    pub fn merge(left: &[PupilMeasurement], right: &[PupilMeasurement]) -> Vec<OutputRecord> {
        let Some(last) = left.iter().chain(right).map(|m| m.frame_index).max() else {
            return Vec::new();
        };

        let mut left_side = Side::new("left", left);
        let mut right_side = Side::new("right", right);

        let records: Vec<OutputRecord> = (0..=last)
            .map(|index| {
                OutputRecord::new(index, left_side.take(index), right_side.take(index))
            })
            .collect();

        debug!(
            records = records.len(),
            left = left.len(),
            right = right.len(),
            "Aligned measurement streams"
        );
        records
    }

    /// Online path: frames already arrive one per index
    pub fn from_tracking_frames(frames: &[TrackingFrame]) -> Vec<OutputRecord> {
        frames.iter().copied().map(OutputRecord::from).collect()
    }
}

struct Side<'a> {
    name: &'static str,
    items: &'a [PupilMeasurement],
    cursor: usize,
}

impl<'a> Side<'a> {
    fn new(name: &'static str, items: &'a [PupilMeasurement]) -> Self {
        Self {
            name,
            items,
            cursor: 0,
        }
    }

    fn take(&mut self, index: u64) -> Option<PupilMeasurement> {
        while let Some(next) = self.items.get(self.cursor) {
            if next.frame_index >= index {
                break;
            }
            warn!(
                eye = self.name,
                frame_index = next.frame_index,
                expected = index,
                "Skipping out-of-order measurement"
            );
            self.cursor += 1;
        }

        match self.items.get(self.cursor) {
            Some(next) if next.frame_index == index => {
                self.cursor += 1;
                Some(*next)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{PupilObservation, MISSING_VALUE};

    fn measured(index: u64, diameter: f32) -> PupilMeasurement {
        PupilMeasurement::from_observation(
            index,
            &PupilObservation {
                diameter,
                confidence: 0.8,
                timestamp: index,
            },
            40.0,
        )
    }

    #[test]
    fn test_dense_output_with_gaps() {
        let left = vec![measured(0, 10.0), measured(2, 11.0), measured(3, 12.0)];
        let right = vec![measured(1, 20.0), measured(5, 21.0)];

        let records = StreamAligner::merge(&left, &right);
        assert_eq!(records.len(), 6);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.frame_index, i as u64);
        }

        assert_eq!(records[0].left.diameter, 10.0);
        assert_eq!(records[0].right.diameter, MISSING_VALUE);
        assert_eq!(records[1].left.confidence, MISSING_VALUE);
        assert_eq!(records[1].right.diameter, 20.0);
        assert_eq!(records[4].left.diameter, MISSING_VALUE);
        assert_eq!(records[4].right.diameter, MISSING_VALUE);
        assert_eq!(records[5].right.diameter, 21.0);
    }

    #[test]
    fn test_one_side_empty() {
        let left = vec![measured(1, 10.0)];
        let records = StreamAligner::merge(&left, &[]);
        assert_eq!(records.len(), 2);
        assert!(records[0].left.is_missing());
        assert!(records[1].right.is_missing());
        assert_eq!(records[1].left.diameter, 10.0);
    }

    #[test]
    fn test_both_empty() {
        assert!(StreamAligner::merge(&[], &[]).is_empty());
    }

    #[test]
    fn test_duplicates_skipped() {
        let left = vec![measured(0, 1.0), measured(0, 2.0), measured(1, 3.0)];
        let records = StreamAligner::merge(&left, &[]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].left.diameter, 1.0);
        assert_eq!(records[1].left.diameter, 3.0);
    }
}
