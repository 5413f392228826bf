//! CompanionLink - the main interface for watchlink.
//!
//! This module provides [`CompanionLink`], the composition root that wires
//! the transports, the state broadcaster, the command router and the
//! reconnection supervisor together.
//!
//! # Architecture
//!
//! ```text
//! Engine ─states─► StateBroadcaster ─► lane ─► SessionTransport ─► wearable
//!                                    └► lane ─► VendorTransport ──► VendorLink
//!
//! wearable ─► transports ─► inbound channel ─► CommandRouter ─► Engine
//!                                                   └─ack─► same lane
//! ```
//!
//! A transport whose SDK is not provided is replaced by a [`NullTransport`].
//!
//! # Example
//!
//! ```ignore
//! use watchlink_sync_client::{CompanionLink, LinkConfig, FileDeviceStore, ScriptedEngine};
//!
//! let link = CompanionLink::builder(LinkConfig::default(), engine, store)
//!     .with_session(session_sdk, session_events)
//!     .with_vendor(vendor_sdk, vendor_events)
//!     .build()
//!     .await;
//!
//! if let Some(supervisor) = link.supervisor() {
//!     supervisor.try_reconnect_from_persisted().await?;
//! }
//! link.broadcast(state);
//! ```

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use watchlink_sync_types::{TransportId, WorkoutPhase, WorkoutState};

use crate::broadcaster::{StateBroadcaster, TransportStatus};
use crate::config::LinkConfig;
use crate::engine::WorkoutEngine;
use crate::link::VendorLink;
use crate::router::CommandRouter;
use crate::store::DevicePersistenceStore;
use crate::supervisor::ReconnectionSupervisor;
use crate::transport::{
    NullTransport, SessionEvent, SessionSdk, SessionTransport, TransportAdapter, VendorEvent,
    VendorSdk, VendorTransport,
};

/// Inbound command queue depth shared by all transports.
const INBOUND_QUEUE: usize = 64;

/// Collects the collaborators of a [`CompanionLink`].
pub struct CompanionLinkBuilder {
    config: LinkConfig,
    engine: Arc<dyn WorkoutEngine>,
    store: Arc<dyn DevicePersistenceStore>,
    session: Option<(Arc<dyn SessionSdk>, mpsc::UnboundedReceiver<SessionEvent>)>,
    vendor: Option<(Arc<dyn VendorSdk>, mpsc::UnboundedReceiver<VendorEvent>)>,
}

impl CompanionLinkBuilder {
    /// Use the platform session SDK.
    pub fn with_session(
        mut self,
        sdk: Arc<dyn SessionSdk>,
        events: mpsc::UnboundedReceiver<SessionEvent>,
    ) -> Self {
        self.session = Some((sdk, events));
        self
    }

    /// Use the vendor wearable SDK.
    pub fn with_vendor(
        mut self,
        sdk: Arc<dyn VendorSdk>,
        events: mpsc::UnboundedReceiver<VendorEvent>,
    ) -> Self {
        self.vendor = Some((sdk, events));
        self
    }

    /// Start every task. Must be called inside a tokio runtime.
    ///
    /// Session activation failures are recorded on the session transport and
    /// do not prevent the link from starting.
    pub async fn build(self) -> CompanionLink {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
        let mut tasks = Vec::new();
        let mut transports: Vec<Arc<dyn TransportAdapter>> = Vec::with_capacity(2);

        match self.session {
            Some((sdk, events)) => {
                let session = SessionTransport::new(sdk, self.config.link.context_policy);
                if let Err(e) = session.activate().await {
                    warn!(transport = "session", error = %e, "session not active");
                }
                tasks.push(session.spawn_events(events, inbound_tx.clone()));
                transports.push(Arc::new(session));
            }
            None => {
                debug!(transport = "session", "no session SDK, using null transport");
                transports.push(Arc::new(NullTransport::replacing(TransportId::Session)));
            }
        }

        let supervisor = match self.vendor {
            Some((sdk, events)) => {
                let (link, task) =
                    VendorLink::spawn(Arc::clone(&sdk), Arc::clone(&self.store), events, inbound_tx);
                tasks.push(task);
                transports.push(Arc::new(VendorTransport::new(link.clone())));
                Some(ReconnectionSupervisor::from_config(
                    link,
                    Arc::clone(&self.store),
                    sdk,
                    &self.config,
                ))
            }
            None => {
                debug!(transport = "vendor", "no vendor SDK, using null transport");
                transports.push(Arc::new(NullTransport::replacing(TransportId::Vendor)));
                None
            }
        };

        let broadcaster = Arc::new(StateBroadcaster::new(transports));
        let router = Arc::new(CommandRouter::new(
            self.engine,
            Arc::clone(&broadcaster),
            self.config.link.dedupe_capacity,
        ));
        tasks.push(Arc::clone(&router).spawn(inbound_rx));

        info!(
            policy = self.config.link.context_policy.as_str(),
            vendor = supervisor.is_some(),
            "companion link started"
        );

        CompanionLink {
            broadcaster,
            router,
            supervisor,
            tasks,
        }
    }
}

/// Running link between the engine and the wearable.
pub struct CompanionLink {
    broadcaster: Arc<StateBroadcaster>,
    router: Arc<CommandRouter>,
    supervisor: Option<ReconnectionSupervisor>,
    tasks: Vec<JoinHandle<()>>,
}

impl CompanionLink {
    /// Start building a link.
    pub fn builder(
        config: LinkConfig,
        engine: Arc<dyn WorkoutEngine>,
        store: Arc<dyn DevicePersistenceStore>,
    ) -> CompanionLinkBuilder {
        CompanionLinkBuilder {
            config,
            engine,
            store,
            session: None,
            vendor: None,
        }
    }

    /// Send `state` to every transport. Never blocks, never fails.
    pub fn broadcast(&self, state: WorkoutState) {
        self.broadcaster.broadcast(state);
    }

    /// Status of every transport.
    pub fn statuses(&self) -> Vec<TransportStatus> {
        self.broadcaster.statuses()
    }

    /// Vendor reconnection supervisor, if a vendor SDK was provided.
    pub fn supervisor(&self) -> Option<&ReconnectionSupervisor> {
        self.supervisor.as_ref()
    }

    /// The command router.
    pub fn router(&self) -> &Arc<CommandRouter> {
        &self.router
    }

    /// The state broadcaster.
    pub fn broadcaster(&self) -> &Arc<StateBroadcaster> {
        &self.broadcaster
    }

    /// Wait until every queued send has been attempted.
    pub async fn flush(&self) {
        self.broadcaster.flush().await;
    }

    /// Broadcast every state the engine publishes on `states`.
    pub fn pump_states(&self, mut states: mpsc::Receiver<WorkoutState>) -> JoinHandle<()> {
        let broadcaster = Arc::clone(&self.broadcaster);
        tokio::spawn(async move {
            while let Some(state) = states.recv().await {
                broadcaster.broadcast(state);
            }
            debug!("engine state stream closed");
        })
    }

    /// Finish a workout session.
    ///
    /// Sends `final_state` (normally the ended marker), waits for it to go
    /// out, then drops the vendor registrations. The session transport stays
    /// activated for the next workout.
    pub async fn end_session(&self, final_state: WorkoutState) {
        if final_state.phase != WorkoutPhase::Ended {
            warn!(phase = final_state.phase.as_str(), "ending session with a non-ended state");
        }
        info!(workout_id = %final_state.workout_id, version = %final_state.state_version, "ending workout session");

        self.broadcaster.broadcast(final_state);
        self.broadcaster.flush().await;

        if let Some(supervisor) = &self.supervisor {
            if let Err(e) = supervisor.end_session().await {
                debug!(transport = "vendor", error = %e, "vendor link already stopped");
            }
        }
    }

    /// Drain pending sends, release every transport and stop all tasks.
    pub async fn shutdown(self) {
        self.broadcaster.shutdown().await;
        for task in self.tasks {
            task.abort();
        }
        info!("companion link stopped");
    }
}
