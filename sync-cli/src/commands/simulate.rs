//! Run a scripted workout through mock transports.
//!
//! Both SDKs are mocks: the vendor side has one paired wearable that is in
//! range and has the companion app installed. Four states go out (idle,
//! two running steps, ended), plus one `pause` command arriving over both
//! transports.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use watchlink_sync_client::{
    CompanionLink, LinkConfig, MemoryDeviceStore, MockSessionSdk, MockVendorSdk,
    ReconnectOutcome, ScriptedEngine,
};
use watchlink_sync_core::{ConnectionState, DeviceStatus};
use watchlink_sync_types::{
    Command, DeviceIdentity, DeviceUuid, JsonMap, Message, StateVersion, StepType, WorkoutId,
    WorkoutPhase, WorkoutState,
};

/// Run the simulate command.
pub async fn run(config: &LinkConfig, unreachable: bool) -> Result<()> {
    let device = DeviceIdentity::new(DeviceUuid::random(), "fenix 7", "Simulated Watch");
    let (session, session_events) = MockSessionSdk::new();
    session.set_reachable(!unreachable);
    let (vendor, vendor_events) = MockVendorSdk::new();
    vendor.set_device_status(device.uuid, DeviceStatus::Connected);
    let engine = ScriptedEngine::new();

    let link = CompanionLink::builder(
        config.clone(),
        Arc::new(engine.clone()),
        Arc::new(MemoryDeviceStore::with_identity(device.clone())),
    )
    .with_session(Arc::new(session.clone()), session_events)
    .with_vendor(Arc::new(vendor.clone()), vendor_events)
    .build()
    .await;

    let Some(supervisor) = link.supervisor() else {
        bail!("vendor transport missing");
    };
    let outcome = supervisor.try_reconnect_from_persisted().await?;
    if !matches!(outcome, ReconnectOutcome::FastPath(_)) {
        bail!("unexpected reconnect outcome: {:?}", outcome);
    }
    let mut snapshots = supervisor.link().subscribe();
    tokio::time::timeout(
        Duration::from_secs(2),
        snapshots.wait_for(|s| s.state == ConnectionState::AppRegistered),
    )
    .await
    .context("vendor link did not register")??;

    let workout = WorkoutId::new("sim-1");
    link.broadcast(step(&workout, 1, WorkoutPhase::Idle, 0));
    link.broadcast(step(&workout, 2, WorkoutPhase::Running, 0));
    link.broadcast(step(&workout, 3, WorkoutPhase::Running, 1));

    let pause = Message::Command(Command::new("sim-c1", "pause"));
    session.deliver_message(pause.to_json_map()?);
    vendor.deliver_message(device.uuid, pause.to_bytes()?);
    tokio::time::sleep(Duration::from_millis(50)).await;

    link.end_session(WorkoutState::ended_marker(
        workout,
        "Simulated Intervals",
        StateVersion::new(4),
    ))
    .await;

    println!("=== session: persistent context ===");
    for context in session.contexts() {
        println!("  {}", describe_map(&context));
    }
    println!();
    println!("=== session: immediate messages ===");
    if session.messages().is_empty() {
        println!("  (none, peer unreachable)");
    }
    for message in session.messages() {
        println!("  {}", describe_map(&message));
    }
    println!();
    println!("=== vendor: app messages to {} ===", device.friendly_name);
    for (_, payload) in vendor.sent_messages() {
        match Message::from_bytes(&payload) {
            Ok(message) => println!("  {}", describe(&message)),
            Err(e) => println!("  <undecodable: {}>", e),
        }
    }
    println!();
    println!("Engine handled `pause` {} time(s)", engine.count("pause"));
    for status in link.statuses() {
        match status.last_error {
            Some(e) => println!("{:>8}: {} (last error: {})", status.id, status.status, e),
            None => println!("{:>8}: {}", status.id, status.status),
        }
    }

    link.shutdown().await;
    Ok(())
}

fn step(workout: &WorkoutId, version: u64, phase: WorkoutPhase, index: u32) -> WorkoutState {
    WorkoutState {
        state_version: StateVersion::new(version),
        workout_id: workout.clone(),
        workout_name: "Simulated Intervals".into(),
        phase,
        step_index: index,
        step_count: 5,
        step_name: format!("Interval {}", index + 1),
        step_type: StepType::Timed,
        remaining_ms: Some(60_000),
        round_info: None,
    }
}

fn describe_map(map: &JsonMap) -> String {
    if map.is_empty() {
        return "{} (cleared)".to_string();
    }
    match Message::from_json_map(map.clone()) {
        Ok(message) => describe(&message),
        Err(_) => serde_json::Value::Object(map.clone()).to_string(),
    }
}

fn describe(message: &Message) -> String {
    match message {
        Message::StateUpdate(s) => format!(
            "stateUpdate v{} {} step {}/{}",
            s.state_version,
            s.phase.as_str(),
            s.step_index,
            s.step_count
        ),
        Message::CommandAck(ack) => format!("commandAck {} {:?}", ack.command_id, ack.status),
        Message::Command(c) => format!("command {} {}", c.command_id, c.command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simulation_runs_reachable() {
        assert!(run(&LinkConfig::default(), false).await.is_ok());
    }

    #[tokio::test]
    async fn simulation_runs_unreachable() {
        assert!(run(&LinkConfig::default(), true).await.is_ok());
    }

    #[test]
    fn cleared_context_is_labelled() {
        assert_eq!(describe_map(&JsonMap::new()), "{} (cleared)");
    }
}
