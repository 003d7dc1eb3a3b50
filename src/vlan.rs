//! VLAN data model and the comparison core.
//!
//! Structured command output crosses into this module as an opaque
//! `serde_json::Value` and is validated into typed records exactly once, at
//! [`VlanSnapshot::from_parsed`]. Everything downstream works with plain
//! integers.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CommandError, ConfigError};

/// A VLAN identifier as configured on a switch.
pub type VlanId = u16;

/// Highest usable 802.1Q VLAN id.
pub const MAX_VLAN_ID: u32 = 4094;

/// One VLAN entry as reported by a device.
///
/// Only `vlan_id` participates in verification; the remaining attributes are
/// carried opaquely for callers that want to inspect them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VlanRecord {
    pub vlan_id: VlanId,
    pub attributes: Value,
}

/// The set of VLANs observed on one device at one point in time.
///
/// Immutable once captured; a value, not a live view of the device.
#[derive(Debug, Clone)]
pub struct VlanSnapshot {
    records: Vec<VlanRecord>,
}

impl VlanSnapshot {
    /// Validates a collaborator-parsed payload into a typed snapshot.
    ///
    /// The payload must be a mapping with a `vlans` object whose entries each
    /// carry a `vlan_id` coercible to an integer in the usable range. Any
    /// other shape is a [`CommandError::MalformedOutput`].
    pub fn from_parsed(data: &Value) -> Result<Self, CommandError> {
        let vlans = data
            .get("vlans")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                CommandError::MalformedOutput("payload has no 'vlans' mapping".to_string())
            })?;

        let mut records = Vec::with_capacity(vlans.len());
        for (key, entry) in vlans {
            let id_value = entry.get("vlan_id").ok_or_else(|| {
                CommandError::MalformedOutput(format!("vlan entry '{key}' has no 'vlan_id'"))
            })?;
            records.push(VlanRecord {
                vlan_id: coerce_vlan_id(key, id_value)?,
                attributes: entry.clone(),
            });
        }

        Ok(Self { records })
    }

    /// All observed VLAN ids.
    pub fn observed_ids(&self) -> HashSet<VlanId> {
        self.records.iter().map(|r| r.vlan_id).collect()
    }

    pub fn records(&self) -> &[VlanRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Device formatters emit ids as numbers or as numeric strings; both are
/// accepted, nothing else.
fn coerce_vlan_id(key: &str, value: &Value) -> Result<VlanId, CommandError> {
    let id = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
    .ok_or_else(|| {
        CommandError::MalformedOutput(format!(
            "vlan entry '{key}' has non-numeric vlan_id: {value}"
        ))
    })?;

    if id == 0 || id > u64::from(MAX_VLAN_ID) {
        return Err(CommandError::MalformedOutput(format!(
            "vlan entry '{key}' has out-of-range vlan_id {id}"
        )));
    }
    Ok(id as VlanId)
}

/// The ordered list of VLAN ids a run is expected to find.
///
/// Order is load-bearing: failure messages report missing ids in the order
/// they were supplied, so results stay reproducible across runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedVlans(Vec<VlanId>);

impl ExpectedVlans {
    /// Validates a list of ids: non-empty, all within 1..=4094.
    ///
    /// User-supplied duplicates are kept as-is.
    pub fn new(ids: Vec<VlanId>) -> Result<Self, ConfigError> {
        if ids.is_empty() {
            return Err(ConfigError::EmptyExpectedSet);
        }
        for id in &ids {
            if *id == 0 || u32::from(*id) > MAX_VLAN_ID {
                return Err(ConfigError::VlanIdOutOfRange(u32::from(*id)));
            }
        }
        Ok(Self(ids))
    }

    /// Parses a list of decimal id strings, e.g. CLI arguments.
    pub fn parse<I, S>(values: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ids = Vec::new();
        for value in values {
            let text = value.as_ref().trim();
            let id = text
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidVlanId(text.to_string()))?;
            if id == 0 || id > MAX_VLAN_ID {
                return Err(ConfigError::VlanIdOutOfRange(id));
            }
            ids.push(id as VlanId);
        }
        Self::new(ids)
    }

    pub fn ids(&self) -> &[VlanId] {
        &self.0
    }

    /// The expected ids absent from a snapshot, in originally supplied order.
    pub fn missing_from(&self, snapshot: &VlanSnapshot) -> Vec<VlanId> {
        let observed = snapshot.observed_ids();
        self.0
            .iter()
            .copied()
            .filter(|id| !observed.contains(id))
            .collect()
    }
}

impl Default for ExpectedVlans {
    /// The built-in default set used when neither CLI arguments nor the
    /// environment supply one.
    fn default() -> Self {
        Self(vec![11, 12, 13])
    }
}

/// Outcome of comparing an expected set against a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    /// Expected ids not found on the device, in originally supplied order.
    pub missing: Vec<VlanId>,
    /// True exactly when `missing` is empty.
    pub passed: bool,
}

impl VerificationResult {
    pub fn new(missing: Vec<VlanId>) -> Self {
        let passed = missing.is_empty();
        Self { missing, passed }
    }
}
