//! Inbound command routing.

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use watchlink_sync_core::{Admission, CommandDedupe};
use watchlink_sync_types::{Command, CommandAck, TransportId};

use crate::broadcaster::StateBroadcaster;
use crate::engine::WorkoutEngine;
use crate::transport::InboundCommand;

/// What the router did with one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Handed to the engine; this ack went back on the originating transport.
    Forwarded(CommandAck),
    /// Already handled via another transport; the recorded ack was resent.
    Replayed(CommandAck),
    /// Redelivery on a transport that already has its ack, or still in flight.
    Dropped,
}

/// Deduplicates inbound commands, forwards them to the engine and acks them
/// on the transport they arrived on.
pub struct CommandRouter {
    engine: Arc<dyn WorkoutEngine>,
    broadcaster: Arc<StateBroadcaster>,
    dedupe: Mutex<CommandDedupe>,
}

impl CommandRouter {
    /// Create a router remembering up to `capacity` command ids.
    pub fn new(
        engine: Arc<dyn WorkoutEngine>,
        broadcaster: Arc<StateBroadcaster>,
        capacity: usize,
    ) -> Self {
        Self {
            engine,
            broadcaster,
            dedupe: Mutex::new(CommandDedupe::new(capacity)),
        }
    }

    /// Route one command.
    pub async fn receive(&self, command: Command, from: TransportId) -> RouteOutcome {
        let admission = self.dedupe().admit(&command.command_id, from);

        match admission {
            Admission::New => {
                info!(transport = from.as_str(), command_id = %command.command_id, command = %command.command, "forwarding command");
                let ack = self.engine.handle(&command).await.into_ack(&command);
                self.dedupe().record_ack(&ack, from);
                self.broadcaster.send_ack(from, ack.clone());
                RouteOutcome::Forwarded(ack)
            }
            Admission::Replay(ack) => {
                debug!(transport = from.as_str(), command_id = %command.command_id, "replaying recorded ack");
                self.dedupe().record_ack(&ack, from);
                self.broadcaster.send_ack(from, ack.clone());
                RouteOutcome::Replayed(ack)
            }
            Admission::Duplicate => {
                debug!(transport = from.as_str(), command_id = %command.command_id, "duplicate command dropped");
                RouteOutcome::Dropped
            }
        }
    }

    /// Drain `inbound` in receipt order until every sender is gone.
    pub async fn run(&self, mut inbound: mpsc::Receiver<InboundCommand>) {
        while let Some(InboundCommand { command, from }) = inbound.recv().await {
            self.receive(command, from).await;
        }
        debug!("inbound command channel closed");
    }

    /// Run the router on its own task.
    pub fn spawn(self: Arc<Self>, inbound: mpsc::Receiver<InboundCommand>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(inbound).await })
    }

    fn dedupe(&self) -> std::sync::MutexGuard<'_, CommandDedupe> {
        self.dedupe.lock().unwrap_or_else(|e| e.into_inner())
    }
}
