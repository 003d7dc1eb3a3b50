use indexmap::IndexMap;
use log::{debug, info, warn};
use tokio::time;

use crate::config::{FailurePolicy, RetryPolicy};
use crate::device::Device;
use crate::error::{ConnectError, VerifyError};

/// The live-session registry: name-keyed, insertion-ordered.
///
/// Only the connection manager inserts; the cleanup sweep drains; the
/// verifier reads a single entry by name.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: IndexMap<String, Box<dyn Device>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, name: String, device: Box<dyn Device>) {
        self.sessions.insert(name, device);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sessions.contains_key(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn Device + 'static)> {
        self.sessions.get_mut(name).map(|device| device.as_mut())
    }

    /// Registered device names, in connection order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Brings up sessions for a collection of devices under a bounded-retry
/// policy and keeps the successes registered for later bulk teardown.
pub struct ConnectionManager {
    registry: SessionRegistry,
    retry: RetryPolicy,
    failure_policy: FailurePolicy,
}

impl ConnectionManager {
    pub fn new(retry: RetryPolicy, failure_policy: FailurePolicy) -> Self {
        Self {
            registry: SessionRegistry::new(),
            retry,
            failure_policy,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SessionRegistry {
        &mut self.registry
    }

    /// Connects every device, in inventory order.
    ///
    /// Devices connected before a failure stay registered so the cleanup
    /// sweep can still tear them down. Under [`FailurePolicy::FailRun`] the
    /// first device that exhausts its budget fails the whole run; under
    /// [`FailurePolicy::IsolateDevice`] it is logged and skipped.
    pub async fn connect_all<I>(&mut self, devices: I) -> Result<(), VerifyError>
    where
        I: IntoIterator<Item = Box<dyn Device>>,
    {
        for mut device in devices {
            let name = device.name().to_string();
            match self.connect_with_retry(device.as_mut(), &name).await {
                Ok(()) => {
                    info!("connected to {name}");
                    self.registry.insert(name, device);
                }
                Err(source) => match self.failure_policy {
                    FailurePolicy::FailRun => {
                        return Err(VerifyError::Connect {
                            device: name,
                            source,
                        });
                    }
                    FailurePolicy::IsolateDevice => {
                        warn!("skipping device {name}: {source}");
                    }
                },
            }
        }
        Ok(())
    }

    /// One device's bounded-retry loop. Retryable errors are absorbed up to
    /// the attempt budget with a fixed delay in between; anything else
    /// escalates immediately.
    async fn connect_with_retry(
        &self,
        device: &mut dyn Device,
        name: &str,
    ) -> Result<(), ConnectError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match device.connect().await {
                Ok(()) => return Ok(()),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => {
                    warn!("attempt {attempt} failed to connect to {name}: {err}");
                    if attempt >= max_attempts {
                        return Err(err);
                    }
                    attempt += 1;
                    time::sleep(self.retry.retry_delay).await;
                }
            }
        }
    }

    /// Disconnects every registered session, in connection order.
    ///
    /// Individual failures are logged and never abort the sweep.
    pub async fn disconnect_all(&mut self) {
        for (name, mut device) in self.registry.sessions.drain(..) {
            if !device.is_connected() {
                debug!("{name}: already disconnected");
                continue;
            }
            match device.disconnect().await {
                Ok(()) => info!("disconnected from {name}"),
                Err(err) => warn!("failed to disconnect device {name}: {err}"),
            }
        }
    }
}
