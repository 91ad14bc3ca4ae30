//! Target tracking
//!
//! Decides which fiducial in the frame matters to the active behavior and how
//! long it has been since any accepted tag was seen.

use crate::common::types::Seconds;
use crate::common::Detection;

/// Snapshot of what the tracker knows
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackerState {
    pub last_seen_tag: Option<i32>,
    pub last_seen_time: Option<Seconds>,
    /// Set once no accepted tag has been seen for longer than the lost timeout
    pub is_stale: bool,
}

/// A tracker for the tags of interest
#[derive(Debug)]
pub struct TargetTracker {
    state: TrackerState,
    lost_timeout: Seconds,
}

impl TargetTracker {
    /// Create a new tracker
    pub fn new(lost_timeout: Seconds) -> Self {
        TargetTracker {
            state: TrackerState::default(),
            lost_timeout,
        }
    }

    /// Pick one detection from the frame.
    ///
    /// Ids are tried in `preference` order and the first id present wins; among
    /// several detections with that id, the first reported one is used. Detections
    /// with a non-finite bearing or position are skipped.
    pub fn select<'a>(detections: &'a [Detection], preference: &[i32]) -> Option<&'a Detection> {
        preference.iter().find_map(|id| {
            detections
                .iter()
                .find(|d| d.tag_id == *id && d.is_finite())
        })
    }

    /// Fold this cycle's detection into the tracker state
    pub fn update(
        &mut self,
        detection: Option<&Detection>,
        now: Seconds,
        accepted_ids: &[i32],
    ) -> TrackerState {
        match detection.filter(|d| accepted_ids.contains(&d.tag_id)) {
            Some(detection) => {
                self.state.last_seen_tag = Some(detection.tag_id);
                self.state.last_seen_time = Some(now);
                self.state.is_stale = false;
            }
            None => {
                // nothing seen yet means nothing to lose
                self.state.is_stale = self
                    .state
                    .last_seen_time
                    .map_or(false, |seen| now - seen > self.lost_timeout);
            }
        }
        self.state
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = TrackerState::default();
    }
}
