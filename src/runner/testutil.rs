//! Scripted devices for exercising the runner without a network.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::device::{ConnectionState, Device};
use crate::error::{CommandError, ConnectError, DisconnectError};

/// A scripted connect outcome.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Outcome {
    Retryable,
    Fatal,
}

/// Builds a structured payload with the given VLAN ids, shaped like a
/// device's JSON formatter output.
pub(crate) fn vlan_payload(ids: &[u16]) -> Value {
    let mut vlans = serde_json::Map::new();
    for id in ids {
        vlans.insert(
            id.to_string(),
            json!({ "vlan_id": id, "name": format!("VLAN{id:04}") }),
        );
    }
    json!({ "vlans": vlans })
}

/// A [`Device`] whose connect attempts fail according to a script, then
/// succeed, and whose command output is a canned payload.
pub(crate) struct ScriptedDevice {
    name: String,
    script: VecDeque<Outcome>,
    payload: Option<Value>,
    state: ConnectionState,
    attempts: Arc<AtomicUsize>,
    disconnects: Arc<AtomicUsize>,
    fail_disconnect: Arc<AtomicBool>,
}

impl ScriptedDevice {
    pub(crate) fn new(name: &str, failures: Vec<Outcome>) -> Self {
        Self {
            name: name.to_string(),
            script: failures.into(),
            payload: None,
            state: ConnectionState::Disconnected,
            attempts: Arc::new(AtomicUsize::new(0)),
            disconnects: Arc::new(AtomicUsize::new(0)),
            fail_disconnect: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Connect attempts made so far, shared with the test.
    pub(crate) fn attempts(&self) -> &Arc<AtomicUsize> {
        &self.attempts
    }

    /// Successful teardowns so far, shared with the test.
    pub(crate) fn disconnects(&self) -> &Arc<AtomicUsize> {
        &self.disconnects
    }

    /// Makes the next real disconnect report an error.
    pub(crate) fn mark_disconnect_failure(&self) {
        self.fail_disconnect.store(true, Ordering::SeqCst);
    }

    pub(crate) fn boxed(self) -> Box<dyn Device> {
        Box::new(self)
    }
}

#[async_trait]
impl Device for ScriptedDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    async fn connect(&mut self) -> Result<(), ConnectError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.state = ConnectionState::Connecting;
        match self.script.pop_front() {
            None => {
                self.state = ConnectionState::Connected;
                Ok(())
            }
            Some(Outcome::Retryable) => {
                self.state = ConnectionState::Failed;
                Err(ConnectError::Timeout(Duration::from_secs(1)))
            }
            Some(Outcome::Fatal) => {
                self.state = ConnectionState::Failed;
                Err(ConnectError::ChannelClosed)
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), DisconnectError> {
        if self.state != ConnectionState::Connected {
            return Ok(());
        }
        self.state = ConnectionState::Disconnected;
        if self.fail_disconnect.load(Ordering::SeqCst) {
            // Manufacture a real send error: the receiver is already gone.
            let (tx, rx) = mpsc::channel::<String>(1);
            drop(rx);
            tx.send("exit\n".to_string())
                .await
                .map_err(DisconnectError::Send)?;
        }
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
        match &self.payload {
            Some(payload) => Ok(payload.clone()),
            None => Err(CommandError::MalformedOutput(
                "no scripted payload".to_string(),
            )),
        }
    }
}
