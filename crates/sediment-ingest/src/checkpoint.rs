//! Channel checkpoint evaluation.
//!
//! The published checkpoint is the earliest position below which all data
//! is either persisted or replayable: the minimum over live buffer start
//! positions and in-flight sync-task positions, falling back to the last
//! consumed position when both sets are empty. Ties go to the buffer
//! candidate so the checkpoint never races ahead of not-yet-yielded data.

use crate::types::{Position, SegmentId};

/// Where the evaluated checkpoint came from, for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointSource {
    /// Earliest live segment buffer.
    SegmentBuffer,
    /// Earliest in-flight sync task.
    SyncManager,
    /// Latest position consumed from the message stream.
    LastConsumed,
}

/// An evaluated checkpoint candidate.
#[derive(Debug, Clone)]
pub struct CheckpointCandidate {
    /// The checkpoint position.
    pub position: Position,
    /// Which input won the selection.
    pub source: CheckpointSource,
    /// Segment backing the candidate, when one exists.
    pub segment_id: Option<SegmentId>,
}

/// Combines buffer and sync-manager watermarks into the channel checkpoint.
///
/// Pure selection; monotonicity clamping happens at the publication site.
#[must_use]
pub fn evaluate_checkpoint(
    buffer_candidate: Option<(SegmentId, Position)>,
    sync_candidate: Option<(SegmentId, Position)>,
    last_consumed: &Position,
) -> CheckpointCandidate {
    match (buffer_candidate, sync_candidate) {
        (None, None) => CheckpointCandidate {
            position: last_consumed.clone(),
            source: CheckpointSource::LastConsumed,
            segment_id: None,
        },
        (Some((segment_id, position)), None) => CheckpointCandidate {
            position,
            source: CheckpointSource::SegmentBuffer,
            segment_id: Some(segment_id),
        },
        (None, Some((segment_id, position))) => CheckpointCandidate {
            position,
            source: CheckpointSource::SyncManager,
            segment_id: Some(segment_id),
        },
        (Some((buffer_id, buffer_pos)), Some((sync_id, sync_pos))) => {
            if sync_pos.timestamp >= buffer_pos.timestamp {
                CheckpointCandidate {
                    position: buffer_pos,
                    source: CheckpointSource::SegmentBuffer,
                    segment_id: Some(buffer_id),
                }
            } else {
                CheckpointCandidate {
                    position: sync_pos,
                    source: CheckpointSource::SyncManager,
                    segment_id: Some(sync_id),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(ts: u64) -> Position {
        Position::new(ts.to_be_bytes(), ts)
    }

    #[test]
    fn test_both_empty_falls_back_to_consumed() {
        let result = evaluate_checkpoint(None, None, &pos(42));
        assert_eq!(result.position.timestamp, 42);
        assert_eq!(result.source, CheckpointSource::LastConsumed);
        assert_eq!(result.segment_id, None);
    }

    #[test]
    fn test_single_candidate_wins() {
        let result = evaluate_checkpoint(Some((1, pos(10))), None, &pos(42));
        assert_eq!(result.source, CheckpointSource::SegmentBuffer);
        assert_eq!(result.position.timestamp, 10);

        let result = evaluate_checkpoint(None, Some((2, pos(5))), &pos(42));
        assert_eq!(result.source, CheckpointSource::SyncManager);
        assert_eq!(result.segment_id, Some(2));
    }

    #[test]
    fn test_lower_timestamp_wins() {
        let result = evaluate_checkpoint(Some((1, pos(30))), Some((2, pos(5))), &pos(42));
        assert_eq!(result.source, CheckpointSource::SyncManager);
        assert_eq!(result.position.timestamp, 5);

        let result = evaluate_checkpoint(Some((1, pos(5))), Some((2, pos(30))), &pos(42));
        assert_eq!(result.source, CheckpointSource::SegmentBuffer);
        assert_eq!(result.position.timestamp, 5);
    }

    #[test]
    fn test_tie_goes_to_buffer() {
        let result = evaluate_checkpoint(Some((1, pos(7))), Some((2, pos(7))), &pos(42));
        assert_eq!(result.source, CheckpointSource::SegmentBuffer);
        assert_eq!(result.segment_id, Some(1));
    }
}
