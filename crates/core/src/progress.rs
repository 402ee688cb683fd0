//! Completion figures derived from a snapshot.

use crate::types::Snapshot;
use serde::Serialize;

/// Computed progress. Never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub checks_done: u64,
    /// Total number of locations; 0 means unknown.
    pub total_locations: u64,
    pub remaining: u64,
    pub percent: f64,
}

impl ProgressSnapshot {
    /// Compute progress from the snapshot and a configured override.
    ///
    /// The room's location count wins when positive, then `override_total`.
    pub fn compute(snapshot: &Snapshot, override_total: u64) -> Self {
        let checks_done = snapshot.checks_done() as u64;
        let total_locations = if snapshot.room.location_count > 0 {
            snapshot.room.location_count as u64
        } else {
            override_total
        };

        if total_locations == 0 {
            return Self {
                checks_done,
                total_locations: 0,
                remaining: 0,
                percent: 0.0,
            };
        }

        Self {
            checks_done,
            total_locations,
            remaining: total_locations.saturating_sub(checks_done),
            percent: checks_done as f64 * 100.0 / total_locations as f64,
        }
    }

    /// Whether a total is known and percentages may be shown.
    pub fn is_total_known(&self) -> bool {
        self.total_locations > 0
    }

    /// Percentage with one decimal, as shown in chat.
    pub fn percent_label(&self) -> String {
        format!("{:.1}", self.percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(value: serde_json::Value) -> Snapshot {
        Snapshot::from_value(value).expect("parse snapshot")
    }

    #[test]
    fn unknown_total_never_divides() {
        let progress = ProgressSnapshot::compute(&snapshot(json!({"checked_locations": [1, 2, 3]})), 0);
        assert_eq!(progress.checks_done, 3);
        assert_eq!(progress.total_locations, 0);
        assert_eq!(progress.remaining, 0);
        assert_eq!(progress.percent, 0.0);
        assert!(!progress.is_total_known());
    }

    #[test]
    fn empty_snapshot_is_zero_of_unknown() {
        let progress =
            ProgressSnapshot::compute(&snapshot(json!({"items": [], "checked_locations": []})), 0);
        assert_eq!(progress.checks_done, 0);
        assert!(!progress.is_total_known());
    }

    #[test]
    fn room_count_beats_override() {
        let s = snapshot(json!({"room": {"location_count": 4}, "checked_locations": [1]}));
        let progress = ProgressSnapshot::compute(&s, 100);
        assert_eq!(progress.total_locations, 4);
        assert_eq!(progress.remaining, 3);
        assert_eq!(progress.percent_label(), "25.0");
    }

    #[test]
    fn override_applies_when_room_count_missing() {
        let s = snapshot(json!({"room": {"location_count": 0}, "checked_locations": [1, 2]}));
        let progress = ProgressSnapshot::compute(&s, 8);
        assert_eq!(progress.total_locations, 8);
        assert_eq!(progress.remaining, 6);
    }

    #[test]
    fn remaining_saturates_when_checks_exceed_total() {
        let s = snapshot(json!({"room": {"location_count": 2}, "checked_locations": [1, 2, 3]}));
        let progress = ProgressSnapshot::compute(&s, 0);
        assert_eq!(progress.remaining, 0);
        assert_eq!(progress.percent_label(), "150.0");
    }
}
