//! Run orchestration.
//!
//! A run executes three sections in strict order: common setup (connect all
//! testbed devices), the verification testcase for the target device, and
//! common cleanup (disconnect everything still registered). Cleanup runs for
//! whatever managed to connect, no matter how the earlier sections ended.
//!
//! # Main Components
//!
//! - [`TestRunner`] - Ordered execution with failure short-circuiting
//! - [`ConnectionManager`] - Connect-with-retry across the inventory
//! - [`SessionRegistry`] - Live sessions, kept for bulk teardown
//! - [`VlanVerifier`] - The per-device verification state machine

use log::error;

use crate::config::RunConfig;
use crate::device::Device;
use crate::error::VerifyError;
use crate::vlan::VlanId;

mod manager;
mod verifier;

#[cfg(test)]
pub(crate) mod testutil;

pub use manager::{ConnectionManager, SessionRegistry};
pub use verifier::{VerifierState, VlanVerifier};

/// Summary of one verification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// True when the verifier reached `Verified` with nothing missing.
    pub passed: bool,
    /// Missing VLAN ids in originally supplied order, when verification got
    /// far enough to compare.
    pub missing: Vec<VlanId>,
    /// Failure description for any non-passing outcome.
    pub failure: Option<String>,
}

impl RunReport {
    pub fn exit_code(&self) -> i32 {
        if self.passed { 0 } else { 1 }
    }
}

/// Ties common setup, the verification testcase, and common cleanup into one
/// ordered execution.
pub struct TestRunner {
    config: RunConfig,
    manager: ConnectionManager,
}

impl TestRunner {
    /// Builds a runner from an explicit configuration, resolved once at the
    /// boundary.
    pub fn new(config: RunConfig) -> Self {
        let manager = ConnectionManager::new(config.retry, config.failure_policy);
        Self { config, manager }
    }

    /// Executes the full run.
    ///
    /// A fatal failure during setup skips the testcase but never the
    /// cleanup sweep: devices that connected before the failure are still
    /// torn down.
    pub async fn run<I>(&mut self, devices: I) -> RunReport
    where
        I: IntoIterator<Item = Box<dyn Device>>,
    {
        let report = match self.manager.connect_all(devices).await {
            Ok(()) => {
                let mut verifier = VlanVerifier::new(&self.config);
                match verifier.run(self.manager.registry_mut()).await {
                    Ok(result) => RunReport {
                        passed: result.passed,
                        missing: result.missing,
                        failure: None,
                    },
                    Err(err) => {
                        let missing = match &err {
                            VerifyError::VerificationFailed { missing, .. } => missing.clone(),
                            _ => Vec::new(),
                        };
                        error!("{err}");
                        RunReport {
                            passed: false,
                            missing,
                            failure: Some(err.to_string()),
                        }
                    }
                }
            }
            Err(err) => {
                error!("common setup failed: {err}");
                RunReport {
                    passed: false,
                    missing: Vec::new(),
                    failure: Some(err.to_string()),
                }
            }
        };

        self.manager.disconnect_all().await;
        report
    }

    /// The live-session registry, mainly useful to inspect a finished run.
    pub fn registry(&self) -> &SessionRegistry {
        self.manager.registry()
    }
}
