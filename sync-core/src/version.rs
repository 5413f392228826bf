//! Version tracking for watchlink.
//!
//! Every [`WorkoutState`] carries a `stateVersion` assigned by the engine.
//! Within one workout the version must strictly increase on the wire. The
//! tracker remembers the last accepted version and rejects anything that is
//! not newer, which is how one send lane (or one receiver) defends against
//! reordering across the two independent transports.
//!
//! [`WorkoutState`]: watchlink_sync_types::WorkoutState

use watchlink_sync_types::{StateVersion, WorkoutId};

/// Per-workout staleness guard.
#[derive(Debug, Clone, Default)]
pub struct VersionTracker {
    last: Option<(WorkoutId, StateVersion)>,
}

impl VersionTracker {
    /// Create a tracker that has seen nothing.
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Accept `version` for `workout_id` if it is newer than the last one.
    ///
    /// A different workout id restarts tracking at `version`.
    pub fn accept(&mut self, workout_id: &WorkoutId, version: StateVersion) -> bool {
        match &self.last {
            Some((current, last)) if current == workout_id && version <= *last => false,
            _ => {
                self.last = Some((workout_id.clone(), version));
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(id: &str) -> WorkoutId {
        WorkoutId::new(id)
    }

    fn v(n: u64) -> StateVersion {
        StateVersion::new(n)
    }

    #[test]
    fn accepts_increasing_versions() {
        let mut tracker = VersionTracker::new();
        assert!(tracker.accept(&w("w1"), v(1)));
        assert!(tracker.accept(&w("w1"), v(2)));
        assert!(tracker.accept(&w("w1"), v(5)));
        assert!(!tracker.accept(&w("w1"), v(4)));
    }

    #[test]
    fn rejects_equal_and_older_versions() {
        let mut tracker = VersionTracker::new();
        tracker.accept(&w("w1"), v(3));

        assert!(!tracker.accept(&w("w1"), v(3)));
        assert!(!tracker.accept(&w("w1"), v(2)));
        assert!(tracker.accept(&w("w1"), v(4)));
    }

    #[test]
    fn new_workout_restarts_tracking() {
        let mut tracker = VersionTracker::new();
        tracker.accept(&w("w1"), v(9));

        assert!(tracker.accept(&w("w2"), v(1)));
        // Returning to w1 starts over too
        assert!(tracker.accept(&w("w1"), v(2)));
    }

    #[test]
    fn version_zero_is_accepted_first() {
        let mut tracker = VersionTracker::new();
        assert!(tracker.accept(&w("w1"), StateVersion::zero()));
        assert!(!tracker.accept(&w("w1"), StateVersion::zero()));
    }
}
