use log::{debug, info, warn};

use crate::config::RunConfig;
use crate::error::VerifyError;
use crate::runner::SessionRegistry;
use crate::vlan::{ExpectedVlans, VerificationResult, VlanSnapshot};

/// Phases of the verification testcase.
///
/// `Failed` is reachable from any non-terminal phase; cleanup runs
/// regardless, so every run ends in `CleanedUp`. Pass or fail is carried by
/// the run's result, not the final state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifierState {
    Init,
    DeviceResolved,
    DataCaptured,
    Verified,
    CleanedUp,
    Failed,
}

/// The verification testcase for one target device.
///
/// Resolves the named device in the live-session registry, captures its VLAN
/// table, compares against the expected set, and disconnects the device. The
/// registry itself is never mutated here; only the one resolved session is
/// touched.
pub struct VlanVerifier {
    target: String,
    command: String,
    expected: ExpectedVlans,
    state: VerifierState,
}

impl VlanVerifier {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            target: config.target_device.clone(),
            command: config.command.clone(),
            expected: config.expected.clone(),
            state: VerifierState::Init,
        }
    }

    pub fn state(&self) -> VerifierState {
        self.state
    }

    /// Runs setup, test, and cleanup in order.
    ///
    /// Cleanup executes no matter how the earlier phases end; its disconnect
    /// errors are logged, never escalated.
    pub async fn run(
        &mut self,
        registry: &mut SessionRegistry,
    ) -> Result<VerificationResult, VerifyError> {
        let outcome = self.execute(registry).await;
        if outcome.is_err() {
            self.state = VerifierState::Failed;
        }
        self.cleanup(registry).await;
        outcome
    }

    async fn execute(
        &mut self,
        registry: &mut SessionRegistry,
    ) -> Result<VerificationResult, VerifyError> {
        if !registry.contains(&self.target) {
            return Err(VerifyError::DeviceNotFound {
                device: self.target.clone(),
            });
        }
        self.state = VerifierState::DeviceResolved;

        info!("parsing VLAN information on device {}", self.target);
        let device = registry
            .get_mut(&self.target)
            .ok_or_else(|| VerifyError::DeviceNotFound {
                device: self.target.clone(),
            })?;
        let parsed =
            device
                .parse_command(&self.command)
                .await
                .map_err(|source| VerifyError::CommandExecution {
                    device: self.target.clone(),
                    source,
                })?;
        let snapshot =
            VlanSnapshot::from_parsed(&parsed).map_err(|source| VerifyError::CommandExecution {
                device: self.target.clone(),
                source,
            })?;
        self.state = VerifierState::DataCaptured;
        debug!(
            "captured {} VLAN(s) from {}",
            snapshot.len(),
            self.target
        );

        let missing = self.expected.missing_from(&snapshot);
        if !missing.is_empty() {
            return Err(VerifyError::VerificationFailed {
                device: self.target.clone(),
                missing,
            });
        }
        self.state = VerifierState::Verified;
        info!(
            "all expected VLANs {:?} are present on {}",
            self.expected.ids(),
            self.target
        );
        Ok(VerificationResult::new(missing))
    }

    /// Testcase cleanup: disconnect the resolved device if still connected.
    async fn cleanup(&mut self, registry: &mut SessionRegistry) {
        if let Some(device) = registry.get_mut(&self.target) {
            if device.is_connected() {
                match device.disconnect().await {
                    Ok(()) => info!("disconnected from {}", self.target),
                    Err(err) => warn!("failed to disconnect device {}: {err}", self.target),
                }
            }
        }
        self.state = VerifierState::CleanedUp;
    }
}
