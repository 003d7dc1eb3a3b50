//! Runtime configuration for a verification run.
//!
//! Everything here is resolved once at the process boundary and passed into
//! the runner as explicit values; inner components never read arguments or
//! the environment on their own.

use std::time::Duration;

use crate::error::ConfigError;
use crate::vlan::ExpectedVlans;

/// Environment variable consulted when no VLAN ids are given on the command
/// line. Comma-separated decimal ids, e.g. `EXPECTED_VLANS=11,12,13`.
pub const EXPECTED_VLANS_ENV: &str = "EXPECTED_VLANS";

/// Command issued on the target device to list configured VLANs.
pub const DEFAULT_VLAN_COMMAND: &str = "show vlan";

/// Default name of the device whose VLAN table is verified.
pub const DEFAULT_TARGET_DEVICE: &str = "leaf1";

/// Bounded-retry policy for connection establishment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per device, including the first one.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// What happens to the run when one device exhausts its retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// A single device's exhausted retries fails the entire run.
    ///
    /// This mirrors the reference behavior and is the default.
    #[default]
    FailRun,
    /// Log the failure, skip the device, and keep connecting the rest.
    ///
    /// The run still fails later if the skipped device was the verification
    /// target, since it will be absent from the session registry.
    IsolateDevice,
}

/// Full configuration for one verification run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Name of the device whose VLAN table is verified.
    pub target_device: String,
    /// Command used to capture the VLAN table.
    pub command: String,
    /// The VLAN ids that must be present.
    pub expected: ExpectedVlans,
    pub retry: RetryPolicy,
    pub failure_policy: FailurePolicy,
    /// Deadline for each connection attempt.
    pub connect_timeout: Duration,
    /// Deadline for each command execution.
    pub command_timeout: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target_device: DEFAULT_TARGET_DEVICE.to_string(),
            command: DEFAULT_VLAN_COMMAND.to_string(),
            expected: ExpectedVlans::default(),
            retry: RetryPolicy::default(),
            failure_policy: FailurePolicy::default(),
            connect_timeout: Duration::from_secs(60),
            command_timeout: Duration::from_secs(60),
        }
    }
}

/// Resolves the expected-VLAN set from its three sources, in priority order:
/// command-line arguments, then the `EXPECTED_VLANS` environment value, then
/// the built-in default.
///
/// The environment value is passed in by the caller so resolution stays a
/// pure function.
pub fn resolve_expected_vlans<I, S>(
    args: I,
    env_value: Option<&str>,
) -> Result<ExpectedVlans, ConfigError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let args: Vec<S> = args.into_iter().collect();
    if !args.is_empty() {
        return ExpectedVlans::parse(args);
    }
    if let Some(raw) = env_value {
        return ExpectedVlans::parse(raw.split(','));
    }
    Ok(ExpectedVlans::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_take_priority_over_environment() {
        let expected = resolve_expected_vlans(["21", "22"], Some("31,32")).expect("valid args");
        assert_eq!(expected.ids(), &[21, 22]);
    }

    #[test]
    fn environment_is_used_when_no_args() {
        let expected =
            resolve_expected_vlans(Vec::<String>::new(), Some("31, 32,33")).expect("valid env");
        assert_eq!(expected.ids(), &[31, 32, 33]);
    }

    #[test]
    fn builtin_default_applies_last() {
        let expected = resolve_expected_vlans(Vec::<String>::new(), None).expect("default");
        assert_eq!(expected.ids(), &[11, 12, 13]);
    }

    #[test]
    fn malformed_environment_value_is_an_error() {
        assert!(resolve_expected_vlans(Vec::<String>::new(), Some("11,,13")).is_err());
    }

    #[test]
    fn default_retry_policy_matches_reference_behavior() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.retry_delay, Duration::from_secs(5));
    }
}
