//! OS-level session transport.
//!
//! The platform session carries two channels:
//! - a persistent context (durable, high latency, last value survives
//!   suspension), written according to a [`ContextPolicy`]
//! - immediate messages (low latency, best effort), attempted only while the
//!   peer is reachable
//!
//! Both carry string-keyed dictionaries, so messages use the JSON map form of
//! the wire schema.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use watchlink_sync_core::{ConnectionStatus, ContextPolicy, ContextWrite};
use watchlink_sync_types::{CommandAck, JsonMap, Message, TransportId, WorkoutState};

use super::{ErrorSlot, InboundCommand, SdkError, TransportAdapter};
use crate::LinkError;

/// Platform session SDK surface.
#[async_trait]
pub trait SessionSdk: Send + Sync {
    /// Whether the platform offers a session at all.
    fn is_supported(&self) -> bool;

    /// Activate the session. Resolves once the platform reports the result.
    async fn activate(&self) -> Result<(), SdkError>;

    /// Whether the peer can currently receive immediate messages.
    fn is_reachable(&self) -> bool;

    /// Whether the companion app is installed on the wearable.
    fn is_companion_installed(&self) -> bool;

    /// Replace the persistent context.
    async fn update_application_context(&self, context: JsonMap) -> Result<(), SdkError>;

    /// Send a best-effort immediate message.
    async fn send_message(&self, message: JsonMap) -> Result<(), SdkError>;
}

/// Callbacks from the session SDK.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Peer reachability flipped.
    ReachabilityChanged(bool),
    /// An immediate message arrived from the wearable.
    MessageReceived(JsonMap),
    /// The platform deactivated the session.
    Deactivated,
}

#[derive(Debug, Default)]
struct SessionState {
    activated: bool,
    shut_down: bool,
    last_context: Option<JsonMap>,
}

/// Transport adapter over the platform session.
pub struct SessionTransport {
    sdk: Arc<dyn SessionSdk>,
    policy: ContextPolicy,
    state: Arc<Mutex<SessionState>>,
    errors: ErrorSlot,
}

impl SessionTransport {
    /// Create an adapter; call [`SessionTransport::activate`] before sending.
    pub fn new(sdk: Arc<dyn SessionSdk>, policy: ContextPolicy) -> Self {
        Self {
            sdk,
            policy,
            state: Arc::new(Mutex::new(SessionState::default())),
            errors: ErrorSlot::default(),
        }
    }

    /// Activate the platform session.
    ///
    /// An already-activated session is reused.
    pub async fn activate(&self) -> Result<(), LinkError> {
        if !self.sdk.is_supported() {
            let err = LinkError::TransportUnavailable(TransportId::Session);
            self.errors.record(&err);
            return Err(err);
        }
        {
            let mut state = self.lock();
            if state.activated {
                state.shut_down = false;
                return Ok(());
            }
        }

        match self.sdk.activate().await {
            Ok(()) => {
                let mut state = self.lock();
                state.activated = true;
                state.shut_down = false;
                info!(transport = "session", "session activated");
                Ok(())
            }
            Err(e) => {
                warn!(transport = "session", error = %e, "session activation failed");
                let err = LinkError::TransportUnavailable(TransportId::Session);
                self.errors.record(&err);
                Err(err)
            }
        }
    }

    /// Process SDK callbacks until the event channel closes.
    ///
    /// Inbound commands are forwarded to `inbound`; anything else the peer
    /// sends is ignored, and undecodable payloads are recorded.
    pub fn spawn_events(
        &self,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
        inbound: mpsc::Sender<InboundCommand>,
    ) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let errors = self.errors.clone();

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    SessionEvent::ReachabilityChanged(reachable) => {
                        info!(transport = "session", reachable, "reachability changed");
                    }
                    SessionEvent::Deactivated => {
                        let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
                        guard.activated = false;
                        guard.last_context = None;
                        info!(transport = "session", "session deactivated");
                    }
                    SessionEvent::MessageReceived(map) => match Message::from_json_map(map) {
                        Ok(Message::Command(command)) => {
                            let inbound_command = InboundCommand {
                                command,
                                from: TransportId::Session,
                            };
                            if inbound.send(inbound_command).await.is_err() {
                                debug!(transport = "session", "router gone, stopping event loop");
                                break;
                            }
                        }
                        Ok(other) => {
                            debug!(transport = "session", action = other.action().as_str(), "ignoring non-command message");
                        }
                        Err(e) => {
                            warn!(transport = "session", error = %e, "dropping undecodable message");
                            errors.record(&LinkError::from(e));
                        }
                    },
                }
            }
        })
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ensure_active(&self) -> Result<(), LinkError> {
        let state = self.lock();
        if state.activated && !state.shut_down {
            Ok(())
        } else {
            Err(LinkError::TransportUnavailable(TransportId::Session))
        }
    }

    fn fail(&self, err: LinkError) -> LinkError {
        self.errors.record(&err);
        err
    }

    async fn write_context(&self, context: JsonMap) -> Result<(), LinkError> {
        if self.lock().last_context.as_ref() == Some(&context) {
            debug!(transport = "session", "context unchanged, skipping write");
            return Ok(());
        }

        self.sdk
            .update_application_context(context.clone())
            .await
            .map_err(|e| self.fail(LinkError::SendFailed(format!("context update: {}", e))))?;
        self.lock().last_context = Some(context);
        Ok(())
    }
}

#[async_trait]
impl TransportAdapter for SessionTransport {
    fn id(&self) -> TransportId {
        TransportId::Session
    }

    fn status(&self) -> ConnectionStatus {
        if !self.sdk.is_supported() {
            return ConnectionStatus::Unavailable;
        }
        if self.ensure_active().is_err() {
            return ConnectionStatus::Disconnected;
        }
        if self.sdk.is_companion_installed() {
            ConnectionStatus::Registered
        } else {
            ConnectionStatus::Connected
        }
    }

    fn last_error(&self) -> Option<LinkError> {
        self.errors.get()
    }

    async fn send_state(&self, state: &WorkoutState) -> Result<(), LinkError> {
        self.ensure_active()?;

        let payload = Message::StateUpdate(state.clone())
            .to_json_map()
            .map_err(|e| self.fail(e.into()))?;
        let context = match self.policy.context_write(state) {
            ContextWrite::State(_) => payload.clone(),
            ContextWrite::Cleared => JsonMap::new(),
        };

        let context_result = self.write_context(context).await;

        let message_result = if self.sdk.is_reachable() {
            self.sdk
                .send_message(payload)
                .await
                .map_err(|e| self.fail(LinkError::SendFailed(format!("message: {}", e))))
        } else {
            debug!(transport = "session", version = %state.state_version, "peer not reachable, skipping immediate message");
            Ok(())
        };

        context_result.and(message_result)
    }

    async fn send_ack(&self, ack: &CommandAck) -> Result<(), LinkError> {
        self.ensure_active()?;
        if !self.sdk.is_reachable() {
            return Err(self.fail(LinkError::DeviceNotReachable));
        }

        let payload = Message::CommandAck(ack.clone())
            .to_json_map()
            .map_err(|e| self.fail(e.into()))?;
        self.sdk
            .send_message(payload)
            .await
            .map_err(|e| self.fail(LinkError::SendFailed(format!("ack: {}", e))))
    }

    async fn shutdown(&self) {
        self.lock().shut_down = true;
        debug!(transport = "session", "session adapter shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockSessionSdk;
    use watchlink_sync_types::{StateVersion, StepType, WorkoutId, WorkoutPhase};

    fn state(version: u64, phase: WorkoutPhase) -> WorkoutState {
        WorkoutState {
            state_version: StateVersion::new(version),
            workout_id: WorkoutId::new("w1"),
            workout_name: "Intervals".into(),
            phase,
            step_index: 0,
            step_count: 5,
            step_name: "Warmup".into(),
            step_type: StepType::Timed,
            remaining_ms: Some(60_000),
            round_info: None,
        }
    }

    async fn active(sdk: &MockSessionSdk, policy: ContextPolicy) -> SessionTransport {
        let transport = SessionTransport::new(Arc::new(sdk.clone()), policy);
        transport.activate().await.unwrap();
        transport
    }

    #[tokio::test]
    async fn unsupported_platform_is_unavailable() {
        let (sdk, _events) = MockSessionSdk::new();
        sdk.set_supported(false);
        let transport = SessionTransport::new(Arc::new(sdk), ContextPolicy::default());

        assert_eq!(transport.status(), ConnectionStatus::Unavailable);
        assert_eq!(
            transport.activate().await,
            Err(LinkError::TransportUnavailable(TransportId::Session))
        );
    }

    #[tokio::test]
    async fn send_before_activation_is_unavailable() {
        let (sdk, _events) = MockSessionSdk::new();
        let transport = SessionTransport::new(Arc::new(sdk.clone()), ContextPolicy::default());

        let result = transport.send_state(&state(1, WorkoutPhase::Idle)).await;
        assert_eq!(result, Err(LinkError::TransportUnavailable(TransportId::Session)));
        assert!(sdk.contexts().is_empty());
    }

    #[tokio::test]
    async fn running_state_clears_context_but_sends_message() {
        let (sdk, _events) = MockSessionSdk::new();
        let transport = active(&sdk, ContextPolicy::ClearDuringActivePhases).await;

        transport.send_state(&state(2, WorkoutPhase::Running)).await.unwrap();

        assert_eq!(sdk.contexts(), vec![JsonMap::new()]);
        let messages = sdk.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["phase"], "running");
    }

    #[tokio::test]
    async fn idle_state_is_written_to_context() {
        let (sdk, _events) = MockSessionSdk::new();
        let transport = active(&sdk, ContextPolicy::ClearDuringActivePhases).await;

        transport.send_state(&state(1, WorkoutPhase::Idle)).await.unwrap();

        let contexts = sdk.contexts();
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0]["action"], "stateUpdate");
        assert_eq!(contexts[0]["version"], 1);
    }

    #[tokio::test]
    async fn always_write_policy_writes_live_state() {
        let (sdk, _events) = MockSessionSdk::new();
        let transport = active(&sdk, ContextPolicy::AlwaysWriteState).await;

        transport.send_state(&state(2, WorkoutPhase::Paused)).await.unwrap();
        assert_eq!(sdk.contexts()[0]["phase"], "paused");
    }

    #[tokio::test]
    async fn repeated_cleared_marker_is_written_once() {
        let (sdk, _events) = MockSessionSdk::new();
        let transport = active(&sdk, ContextPolicy::default()).await;

        transport.send_state(&state(2, WorkoutPhase::Running)).await.unwrap();
        transport.send_state(&state(3, WorkoutPhase::Running)).await.unwrap();

        assert_eq!(sdk.contexts().len(), 1);
        assert_eq!(sdk.messages().len(), 2);
    }

    #[tokio::test]
    async fn unreachable_peer_skips_immediate_message() {
        let (sdk, _events) = MockSessionSdk::new();
        sdk.set_reachable(false);
        let transport = active(&sdk, ContextPolicy::default()).await;

        transport.send_state(&state(1, WorkoutPhase::Idle)).await.unwrap();

        assert_eq!(sdk.contexts().len(), 1);
        assert!(sdk.messages().is_empty());
    }

    #[tokio::test]
    async fn message_failure_is_recorded_not_fatal_for_context() {
        let (sdk, _events) = MockSessionSdk::new();
        let transport = active(&sdk, ContextPolicy::default()).await;
        sdk.fail_next_message("peer busy");

        let result = transport.send_state(&state(1, WorkoutPhase::Idle)).await;

        assert!(matches!(result, Err(LinkError::SendFailed(_))));
        assert_eq!(sdk.contexts().len(), 1);
        assert!(matches!(transport.last_error(), Some(LinkError::SendFailed(_))));
    }

    #[tokio::test]
    async fn ack_requires_reachability() {
        let (sdk, _events) = MockSessionSdk::new();
        let transport = active(&sdk, ContextPolicy::default()).await;
        sdk.set_reachable(false);

        let ack = CommandAck::executed(watchlink_sync_types::CommandId::new("c1"));
        assert_eq!(transport.send_ack(&ack).await, Err(LinkError::DeviceNotReachable));

        sdk.set_reachable(true);
        transport.send_ack(&ack).await.unwrap();
        let messages = sdk.messages();
        assert_eq!(messages[0]["action"], "commandAck");
        assert_eq!(messages[0]["commandId"], "c1");
    }

    #[tokio::test]
    async fn inbound_command_is_forwarded() {
        let (sdk, events) = MockSessionSdk::new();
        let transport = active(&sdk, ContextPolicy::default()).await;
        let (tx, mut rx) = mpsc::channel(8);
        let _task = transport.spawn_events(events, tx);

        let mut map = JsonMap::new();
        map.insert("action".into(), "command".into());
        map.insert("command".into(), "pause".into());
        map.insert("commandId".into(), "c1".into());
        sdk.deliver_message(map);

        let inbound = rx.recv().await.unwrap();
        assert_eq!(inbound.from, TransportId::Session);
        assert_eq!(inbound.command.command, "pause");
    }

    #[tokio::test]
    async fn unknown_inbound_action_is_recorded() {
        let (sdk, events) = MockSessionSdk::new();
        let transport = active(&sdk, ContextPolicy::default()).await;
        let (tx, mut rx) = mpsc::channel(8);
        let _task = transport.spawn_events(events, tx);

        let mut bad = JsonMap::new();
        bad.insert("action".into(), "reboot".into());
        sdk.deliver_message(bad);

        let mut good = JsonMap::new();
        good.insert("action".into(), "command".into());
        good.insert("command".into(), "skip".into());
        good.insert("commandId".into(), "c2".into());
        sdk.deliver_message(good);

        // Events are handled in order, so once c2 arrives the bad one was seen
        let inbound = rx.recv().await.unwrap();
        assert_eq!(inbound.command.command, "skip");
        assert!(matches!(transport.last_error(), Some(LinkError::EncodingFailed(_))));
    }

    #[tokio::test]
    async fn shutdown_stops_sends() {
        let (sdk, _events) = MockSessionSdk::new();
        let transport = active(&sdk, ContextPolicy::default()).await;
        transport.shutdown().await;

        assert_eq!(transport.status(), ConnectionStatus::Disconnected);
        assert!(transport.send_state(&state(1, WorkoutPhase::Idle)).await.is_err());
    }
}
