//! Testbed inventory loading.
//!
//! The testbed is a YAML file naming each device and how to reach it.
//! Device order in the file is preserved, so connection order is stable
//! across runs.
//!
//! ```yaml
//! devices:
//!   leaf1:
//!     host: 192.0.2.11
//!     username: admin
//!     password: secret
//!   leaf2:
//!     host: 192.0.2.12
//!     port: 2222
//!     username: admin
//!     password: secret
//! ```

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::TestbedError;

fn default_ssh_port() -> u16 {
    22
}

/// Connection parameters for one device.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceSpec {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// The device inventory for one run.
#[derive(Debug, Clone, Deserialize)]
pub struct Testbed {
    pub devices: IndexMap<String, DeviceSpec>,
}

impl Testbed {
    /// Loads and validates a testbed file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TestbedError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| TestbedError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    /// Parses and validates testbed YAML.
    pub fn from_yaml(raw: &str) -> Result<Self, TestbedError> {
        let testbed: Self = serde_yaml::from_str(raw)?;
        testbed.validate()?;
        Ok(testbed)
    }

    fn validate(&self) -> Result<(), TestbedError> {
        if self.devices.is_empty() {
            return Err(TestbedError::Empty);
        }
        for (name, spec) in &self.devices {
            if spec.host.trim().is_empty() {
                return Err(TestbedError::InvalidDevice(
                    name.clone(),
                    "empty host".to_string(),
                ));
            }
            if spec.username.trim().is_empty() {
                return Err(TestbedError::InvalidDevice(
                    name.clone(),
                    "empty username".to_string(),
                ));
            }
        }
        Ok(())
    }
}
