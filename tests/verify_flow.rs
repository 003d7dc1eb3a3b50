//! End-to-end verification flow over scripted devices.
//!
//! Drives the full setup / testcase / cleanup ordering through the public
//! [`Device`] seam, without a network.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use vlancheck::config::{FailurePolicy, RetryPolicy, RunConfig};
use vlancheck::device::{ConnectionState, Device};
use vlancheck::error::{CommandError, ConnectError, DisconnectError};
use vlancheck::runner::TestRunner;
use vlancheck::vlan::ExpectedVlans;

/// Shared counters that outlive the boxed device.
struct Probe {
    attempts: Arc<AtomicUsize>,
    disconnects: Arc<AtomicUsize>,
}

struct MockDevice {
    name: String,
    failures_before_success: usize,
    always_fail: bool,
    payload: Value,
    state: ConnectionState,
    attempts: Arc<AtomicUsize>,
    disconnects: Arc<AtomicUsize>,
}

impl MockDevice {
    fn new(name: &str, ids: &[u16]) -> Self {
        let mut vlans = serde_json::Map::new();
        for id in ids {
            vlans.insert(
                id.to_string(),
                json!({ "vlan_id": id, "name": format!("VLAN{id:04}") }),
            );
        }
        Self {
            name: name.to_string(),
            failures_before_success: 0,
            always_fail: false,
            payload: json!({ "vlans": vlans }),
            state: ConnectionState::Disconnected,
            attempts: Arc::new(AtomicUsize::new(0)),
            disconnects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fails the first `failures` connect attempts with a retryable error.
    fn flaky(mut self, failures: usize) -> Self {
        self.failures_before_success = failures;
        self
    }

    /// Fails every connect attempt with a retryable error.
    fn unreachable(mut self) -> Self {
        self.always_fail = true;
        self
    }

    fn probe(&self) -> Probe {
        Probe {
            attempts: Arc::clone(&self.attempts),
            disconnects: Arc::clone(&self.disconnects),
        }
    }

    fn boxed(self) -> Box<dyn Device> {
        Box::new(self)
    }
}

#[async_trait]
impl Device for MockDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    async fn connect(&mut self) -> Result<(), ConnectError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.state = ConnectionState::Connecting;
        if self.always_fail || attempt <= self.failures_before_success {
            self.state = ConnectionState::Failed;
            return Err(ConnectError::Timeout(Duration::from_secs(1)));
        }
        self.state = ConnectionState::Connected;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), DisconnectError> {
        if self.state != ConnectionState::Connected {
            return Ok(());
        }
        self.state = ConnectionState::Disconnected;
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    async fn parse_command(&mut self, _command: &str) -> Result<Value, CommandError> {
        if !self.is_connected() {
            return Err(CommandError::NotConnected);
        }
        Ok(self.payload.clone())
    }
}

fn config(target: &str, expected: &[u16]) -> RunConfig {
    RunConfig {
        target_device: target.to_string(),
        expected: ExpectedVlans::new(expected.to_vec()).expect("valid expected set"),
        retry: RetryPolicy {
            max_attempts: 3,
            retry_delay: Duration::from_millis(1),
        },
        ..RunConfig::default()
    }
}

#[tokio::test]
async fn run_passes_when_observed_vlans_are_a_superset() {
    let leaf = MockDevice::new("leaf1", &[11, 12, 13, 14]);
    let probe = leaf.probe();

    let mut runner = TestRunner::new(config("leaf1", &[11, 12, 13]));
    let report = runner.run(vec![leaf.boxed()]).await;

    assert!(report.passed);
    assert!(report.missing.is_empty());
    assert!(report.failure.is_none());
    assert_eq!(report.exit_code(), 0);
    assert_eq!(probe.disconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn run_fails_and_names_the_single_missing_vlan() {
    let leaf = MockDevice::new("leaf1", &[11, 13, 14]);

    let mut runner = TestRunner::new(config("leaf1", &[11, 12, 13]));
    let report = runner.run(vec![leaf.boxed()]).await;

    assert!(!report.passed);
    assert_eq!(report.missing, vec![12]);
    assert_eq!(report.exit_code(), 1);
    let failure = report.failure.expect("failure message");
    assert!(failure.contains("12"));
}

#[tokio::test]
async fn missing_vlans_are_reported_in_supplied_order() {
    let leaf = MockDevice::new("leaf1", &[12]);

    let mut runner = TestRunner::new(config("leaf1", &[13, 11, 12]));
    let report = runner.run(vec![leaf.boxed()]).await;

    assert_eq!(report.missing, vec![13, 11]);
}

#[tokio::test]
async fn missing_target_fails_but_connected_devices_are_cleaned_up() {
    let spine = MockDevice::new("spine1", &[11]);
    let probe = spine.probe();

    let mut runner = TestRunner::new(config("leaf1", &[11]));
    let report = runner.run(vec![spine.boxed()]).await;

    assert!(!report.passed);
    let failure = report.failure.expect("failure message");
    assert!(failure.contains("leaf1"));
    assert!(failure.contains("not found"));
    // Common cleanup still tears down what did connect.
    assert_eq!(probe.disconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn flaky_target_connects_after_retries_and_passes() {
    let leaf = MockDevice::new("leaf1", &[11, 12, 13]).flaky(2);
    let probe = leaf.probe();

    let mut runner = TestRunner::new(config("leaf1", &[11, 12, 13]));
    let report = runner.run(vec![leaf.boxed()]).await;

    assert!(report.passed);
    assert_eq!(probe.attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn exhausted_retries_fail_the_run_and_clean_up_earlier_devices() {
    let spine = MockDevice::new("spine1", &[11]);
    let spine_probe = spine.probe();
    let leaf = MockDevice::new("leaf1", &[11]).unreachable();
    let leaf_probe = leaf.probe();

    let mut runner = TestRunner::new(config("leaf1", &[11]));
    let report = runner.run(vec![spine.boxed(), leaf.boxed()]).await;

    assert!(!report.passed);
    assert_eq!(leaf_probe.attempts.load(Ordering::SeqCst), 3);
    let failure = report.failure.expect("failure message");
    assert!(failure.contains("leaf1"));
    assert_eq!(spine_probe.disconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn isolated_failure_on_a_non_target_device_keeps_the_run_alive() {
    let bad = MockDevice::new("spine1", &[11]).unreachable();
    let leaf = MockDevice::new("leaf1", &[11, 12, 13]);

    let mut run_config = config("leaf1", &[11, 12, 13]);
    run_config.failure_policy = FailurePolicy::IsolateDevice;

    let mut runner = TestRunner::new(run_config);
    let report = runner.run(vec![bad.boxed(), leaf.boxed()]).await;

    assert!(report.passed);
}

#[tokio::test]
async fn isolated_failure_on_the_target_still_fails_the_run() {
    let leaf = MockDevice::new("leaf1", &[11]).unreachable();

    let mut run_config = config("leaf1", &[11]);
    run_config.failure_policy = FailurePolicy::IsolateDevice;

    let mut runner = TestRunner::new(run_config);
    let report = runner.run(vec![leaf.boxed()]).await;

    assert!(!report.passed);
    let failure = report.failure.expect("failure message");
    assert!(failure.contains("not found"));
}

#[tokio::test]
async fn each_session_is_disconnected_exactly_once() {
    let leaf = MockDevice::new("leaf1", &[11]);
    let leaf_probe = leaf.probe();
    let spine = MockDevice::new("spine1", &[11]);
    let spine_probe = spine.probe();

    let mut runner = TestRunner::new(config("leaf1", &[11]));
    let report = runner.run(vec![leaf.boxed(), spine.boxed()]).await;

    assert!(report.passed);
    // The verifier disconnects the target; the common sweep must not do it
    // again, and tears down the rest exactly once.
    assert_eq!(leaf_probe.disconnects.load(Ordering::SeqCst), 1);
    assert_eq!(spine_probe.disconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn disconnect_is_idempotent_on_a_fresh_device() {
    let mut leaf = MockDevice::new("leaf1", &[11]);

    leaf.connect().await.expect("connect");
    leaf.disconnect().await.expect("first disconnect");
    leaf.disconnect()
        .await
        .expect("second disconnect is a no-op");
}
