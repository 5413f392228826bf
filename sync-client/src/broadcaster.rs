//! State fan-out across transports.
//!
//! Each transport gets its own lane: an unbounded queue drained by one task
//! that sends in enqueue order and drops anything not newer than what the
//! lane already sent. `broadcast()` only enqueues, so it never blocks and
//! never fails, and a slow or disconnected transport never holds up another.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use watchlink_sync_core::{ConnectionStatus, VersionTracker};
use watchlink_sync_types::{CommandAck, TransportId, WorkoutState};

use crate::transport::TransportAdapter;
use crate::LinkError;

enum LaneJob {
    State(Arc<WorkoutState>),
    Ack(CommandAck),
    Flush(oneshot::Sender<()>),
}

struct Lane {
    transport: Arc<dyn TransportAdapter>,
    jobs: mpsc::UnboundedSender<LaneJob>,
    _task: JoinHandle<()>,
}

/// Status of one transport, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportStatus {
    /// Which transport.
    pub id: TransportId,
    /// UI-facing status.
    pub status: ConnectionStatus,
    /// Most recent failure.
    pub last_error: Option<LinkError>,
}

/// Fans workout states out to every transport.
pub struct StateBroadcaster {
    lanes: Vec<Lane>,
}

impl StateBroadcaster {
    /// Start one lane per transport. Must be called inside a tokio runtime.
    pub fn new(transports: Vec<Arc<dyn TransportAdapter>>) -> Self {
        let lanes = transports
            .into_iter()
            .map(|transport| {
                let (jobs, rx) = mpsc::unbounded_channel();
                let task = tokio::spawn(run_lane(Arc::clone(&transport), rx));
                Lane {
                    transport,
                    jobs,
                    _task: task,
                }
            })
            .collect();
        Self { lanes }
    }

    /// Queue `state` on every lane.
    pub fn broadcast(&self, state: WorkoutState) {
        let state = Arc::new(state);
        for lane in &self.lanes {
            if lane.jobs.send(LaneJob::State(Arc::clone(&state))).is_err() {
                debug!(transport = lane.transport.id().as_str(), "lane stopped, state not queued");
            }
        }
    }

    /// Queue `ack` on the lane for `transport` only.
    ///
    /// Returns false if no such lane exists.
    pub fn send_ack(&self, transport: TransportId, ack: CommandAck) -> bool {
        match self.lanes.iter().find(|l| l.transport.id() == transport) {
            Some(lane) => lane.jobs.send(LaneJob::Ack(ack)).is_ok(),
            None => {
                debug!(transport = transport.as_str(), command_id = %ack.command_id, "no lane for ack");
                false
            }
        }
    }

    /// Wait until every job queued so far has been processed.
    pub async fn flush(&self) {
        let mut pending = Vec::with_capacity(self.lanes.len());
        for lane in &self.lanes {
            let (done, rx) = oneshot::channel();
            if lane.jobs.send(LaneJob::Flush(done)).is_ok() {
                pending.push(rx);
            }
        }
        for rx in pending {
            let _ = rx.await;
        }
    }

    /// Status of every transport, in lane order.
    pub fn statuses(&self) -> Vec<TransportStatus> {
        self.lanes
            .iter()
            .map(|lane| TransportStatus {
                id: lane.transport.id(),
                status: lane.transport.status(),
                last_error: lane.transport.last_error(),
            })
            .collect()
    }

    /// The adapter for `id`, if present.
    pub fn transport(&self, id: TransportId) -> Option<Arc<dyn TransportAdapter>> {
        self.lanes
            .iter()
            .find(|l| l.transport.id() == id)
            .map(|l| Arc::clone(&l.transport))
    }

    /// Drain all lanes, then shut every transport down.
    pub async fn shutdown(&self) {
        self.flush().await;
        for lane in &self.lanes {
            lane.transport.shutdown().await;
        }
    }
}

async fn run_lane(transport: Arc<dyn TransportAdapter>, mut jobs: mpsc::UnboundedReceiver<LaneJob>) {
    let id = transport.id();
    let mut versions = VersionTracker::new();

    while let Some(job) = jobs.recv().await {
        match job {
            LaneJob::State(state) => {
                if !versions.accept(&state.workout_id, state.state_version) {
                    debug!(
                        transport = id.as_str(),
                        version = %state.state_version,
                        "stale state, skipping"
                    );
                    continue;
                }
                if let Err(e) = transport.send_state(&state).await {
                    log_failure(id, "state", &e);
                }
            }
            LaneJob::Ack(ack) => {
                if let Err(e) = transport.send_ack(&ack).await {
                    log_failure(id, "ack", &e);
                }
            }
            LaneJob::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

fn log_failure(id: TransportId, kind: &str, error: &LinkError) {
    match error {
        LinkError::TransportUnavailable(_)
        | LinkError::AppNotRegistered(_)
        | LinkError::DeviceNotReachable => {
            debug!(transport = id.as_str(), kind, error = %error, "send skipped");
        }
        _ => warn!(transport = id.as_str(), kind, error = %error, "send failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::NullTransport;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use watchlink_sync_types::{CommandId, StateVersion, WorkoutId};

    #[derive(Default)]
    struct Recording {
        states: Mutex<Vec<u64>>,
        acks: Mutex<Vec<CommandAck>>,
    }

    struct RecordingTransport {
        id: TransportId,
        log: Arc<Recording>,
    }

    #[async_trait]
    impl TransportAdapter for RecordingTransport {
        fn id(&self) -> TransportId {
            self.id
        }
        fn status(&self) -> ConnectionStatus {
            ConnectionStatus::Registered
        }
        fn last_error(&self) -> Option<LinkError> {
            None
        }
        async fn send_state(&self, state: &WorkoutState) -> Result<(), LinkError> {
            self.log.states.lock().unwrap().push(state.state_version.value());
            Ok(())
        }
        async fn send_ack(&self, ack: &CommandAck) -> Result<(), LinkError> {
            self.log.acks.lock().unwrap().push(ack.clone());
            Ok(())
        }
        async fn shutdown(&self) {}
    }

    fn recording(id: TransportId) -> (Arc<dyn TransportAdapter>, Arc<Recording>) {
        let log = Arc::new(Recording::default());
        let transport = RecordingTransport {
            id,
            log: Arc::clone(&log),
        };
        (Arc::new(transport), log)
    }

    fn state(workout: &str, version: u64) -> WorkoutState {
        WorkoutState::ended_marker(WorkoutId::new(workout), "W", StateVersion::new(version))
    }

    #[tokio::test]
    async fn stale_versions_never_reach_the_wire() {
        let (transport, log) = recording(TransportId::Session);
        let broadcaster = StateBroadcaster::new(vec![transport]);

        for v in [1, 2, 2, 1, 5, 3, 6] {
            broadcaster.broadcast(state("w1", v));
        }
        broadcaster.flush().await;

        assert_eq!(*log.states.lock().unwrap(), vec![1, 2, 5, 6]);
    }

    #[tokio::test]
    async fn new_workout_restarts_versions() {
        let (transport, log) = recording(TransportId::Session);
        let broadcaster = StateBroadcaster::new(vec![transport]);

        broadcaster.broadcast(state("w1", 9));
        broadcaster.broadcast(state("w2", 1));
        broadcaster.flush().await;

        assert_eq!(*log.states.lock().unwrap(), vec![9, 1]);
    }

    #[tokio::test]
    async fn ack_goes_to_one_lane_only() {
        let (session, session_log) = recording(TransportId::Session);
        let (vendor, vendor_log) = recording(TransportId::Vendor);
        let broadcaster = StateBroadcaster::new(vec![session, vendor]);

        assert!(broadcaster.send_ack(TransportId::Vendor, CommandAck::executed(CommandId::new("c1"))));
        broadcaster.flush().await;

        assert!(session_log.acks.lock().unwrap().is_empty());
        assert_eq!(vendor_log.acks.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unavailable_transport_does_not_block_others() {
        let (session, log) = recording(TransportId::Session);
        let null: Arc<dyn TransportAdapter> = Arc::new(NullTransport::replacing(TransportId::Vendor));
        let broadcaster = StateBroadcaster::new(vec![null, session]);

        broadcaster.broadcast(state("w1", 1));
        broadcaster.flush().await;

        assert_eq!(*log.states.lock().unwrap(), vec![1]);
        let statuses = broadcaster.statuses();
        assert_eq!(statuses[0].status, ConnectionStatus::Unavailable);
        assert_eq!(statuses[1].status, ConnectionStatus::Registered);
    }

    #[tokio::test]
    async fn ack_for_missing_transport_is_reported() {
        let (session, _) = recording(TransportId::Session);
        let broadcaster = StateBroadcaster::new(vec![session]);
        assert!(!broadcaster.send_ack(TransportId::Vendor, CommandAck::received(CommandId::new("c"))));
    }
}
