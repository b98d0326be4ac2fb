//! Configuration types for the network-state handle
//!
//! Loaded from JSON by embedding applications; every field has a default
//! so an empty object is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::model::AddressFamily;

/// Name kube-proxy style controllers give the dummy device holding
/// virtual service IPs
pub const DEFAULT_DUMMY_DEVICE: &str = "kube-ipvs0";

/// Longest interface name the kernel accepts (IFNAMSIZ - 1)
pub const MAX_INTERFACE_NAME_LEN: usize = 15;

/// Network-state configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetStateConfig {
    /// Dummy device that hosts virtual service IPs
    #[serde(default = "default_dummy_device")]
    pub dummy_device: String,

    /// Families reported by local-address discovery
    ///
    /// Linux installs IPv6 local routes without a preferred source, so
    /// `v6` yields an empty set there and `all` reports IPv4 only.
    #[serde(default)]
    pub address_family: AddressFamily,
}

impl NetStateConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            dummy_device: default_dummy_device(),
            address_family: AddressFamily::default(),
        }
    }

    /// Set the dummy device name
    pub fn with_dummy_device(mut self, name: impl Into<String>) -> Self {
        self.dummy_device = name.into();
        self
    }

    /// Restrict local-address discovery to one family
    pub fn with_address_family(mut self, family: AddressFamily) -> Self {
        self.address_family = family;
        self
    }

    /// Parse a JSON document and validate it
    pub fn from_json_str(json: &str) -> Result<Self, crate::Error> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| crate::Error::config(format!("invalid JSON configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_interface_name(&self.dummy_device)
    }
}

impl Default for NetStateConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Check `name` against the kernel's interface naming rules
pub fn validate_interface_name(name: &str) -> Result<(), crate::Error> {
    if name.is_empty() {
        return Err(crate::Error::config("Interface name cannot be empty"));
    }
    if name.len() > MAX_INTERFACE_NAME_LEN {
        return Err(crate::Error::config(format!(
            "Interface name '{}' is {} bytes, at most {} allowed",
            name,
            name.len(),
            MAX_INTERFACE_NAME_LEN
        )));
    }
    if name == "." || name == ".." {
        return Err(crate::Error::config(format!(
            "Interface name '{name}' is reserved"
        )));
    }
    if name.chars().any(|c| c == '/' || c == ':' || c.is_whitespace()) {
        return Err(crate::Error::config(format!(
            "Interface name '{name}' contains '/', ':' or whitespace"
        )));
    }
    Ok(())
}

fn default_dummy_device() -> String {
    DEFAULT_DUMMY_DEVICE.to_string()
}
