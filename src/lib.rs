//! # vlancheck - VLAN presence verification for network switches
//!
//! `vlancheck` connects to the switches in a testbed over SSH, captures each
//! target's VLAN table as structured data, and verifies that every expected
//! VLAN identifier is present. It is built around a small, explicit
//! lifecycle: connect with bounded retry, capture, compare, and disconnect
//! under every outcome.
//!
//! ## Features
//!
//! - **Bounded-retry setup**: transient link failures are retried a fixed
//!   number of times with a fixed delay; everything else fails fast
//! - **Ordered, reproducible results**: missing VLANs are reported in the
//!   order the expected set was supplied
//! - **Guaranteed teardown**: every session that connected is disconnected,
//!   whether the run passes, fails, or aborts during setup
//! - **Explicit device seam**: the [`device::Device`] trait carries the whole
//!   capability set, so the runner is testable without a network
//! - **Legacy-friendly SSH**: algorithm preferences that still speak to old
//!   switch management planes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vlancheck::config::RunConfig;
//! use vlancheck::device::{Device, SshDevice};
//! use vlancheck::runner::TestRunner;
//! use vlancheck::testbed::Testbed;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let testbed = Testbed::load("testbed.yaml")?;
//!     let config = RunConfig::default();
//!
//!     let devices: Vec<Box<dyn Device>> = testbed
//!         .devices
//!         .iter()
//!         .map(|(name, spec)| {
//!             Box::new(SshDevice::new(
//!                 name.clone(),
//!                 spec.clone(),
//!                 config.connect_timeout,
//!                 config.command_timeout,
//!             )) as Box<dyn Device>
//!         })
//!         .collect();
//!
//!     let mut runner = TestRunner::new(config);
//!     let report = runner.run(devices).await;
//!     std::process::exit(report.exit_code());
//! }
//! ```
//!
//! ## Main Components
//!
//! - [`runner::TestRunner`] - Ordered setup / testcase / cleanup execution
//! - [`runner::ConnectionManager`] - Connect-with-retry across the inventory
//! - [`runner::VlanVerifier`] - The per-device verification state machine
//! - [`device::SshDevice`] - SSH-backed device sessions
//! - [`testbed::Testbed`] - YAML device inventory
//! - [`error`] - Error taxonomy, including the retryable/fatal split

pub mod config;
pub mod device;
pub mod error;
pub mod runner;
pub mod testbed;
pub mod vlan;
