//! Syncer data models
//!
//! This module defines the value types shared by every component:
//! - Service instance information
//! - Services as listed by a discovery backend
//! - The plan produced by diffing discovery and gateway membership
//! - Registry override requests

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One network endpoint belonging to a service
///
/// `metadata` and `ext` carry backend-specific data. `ext` is forwarded
/// unmodified when the instance is handed back to the discovery backend it
/// came from. `enabled` and `changed` are scratch flags owned by the diff
/// engine and registry overrides; backends never populate them on fetch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Instance {
    pub ip: String,
    pub port: u16,
    pub weight: f64,
    pub metadata: HashMap<String, String>,
    pub ext: HashMap<String, String>,
    pub enabled: bool,
    pub changed: bool,
}

/// Key identifying the same host:port
pub type AddressKey = (String, u16);

/// Key identifying a fully matching member (host:port and weight)
pub type IdentityKey = (String, u16, i64);

impl Instance {
    pub fn new(ip: impl Into<String>, port: u16, weight: f64) -> Self {
        Self {
            ip: ip.into(),
            port,
            weight,
            ..Default::default()
        }
    }

    /// `ip:port` form used by gateway admin APIs
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    pub fn address_key(&self) -> AddressKey {
        (self.ip.clone(), self.port)
    }

    /// Weights are compared at micro precision so 1 and 1.0 from different
    /// JSON encoders land on the same key.
    pub fn identity_key(&self) -> IdentityKey {
        (
            self.ip.clone(),
            self.port,
            (self.weight * 1_000_000.0).round() as i64,
        )
    }

    /// Copy with the scratch flags cleared
    pub fn reset(&self) -> Self {
        Self {
            enabled: false,
            changed: false,
            ..self.clone()
        }
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_ext(mut self, key: &str, value: &str) -> Self {
        self.ext.insert(key.to_string(), value.to_string());
        self
    }
}

/// Service as reported by a discovery backend
///
/// A non-empty `instances` list means the backend embedded membership in the
/// listing and it must be used verbatim instead of being fetched again.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Service {
    pub name: String,
    pub instances: Vec<Instance>,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instances: Vec::new(),
        }
    }

    pub fn with_instances(name: impl Into<String>, instances: Vec<Instance>) -> Self {
        Self {
            name: name.into(),
            instances,
        }
    }
}

/// Output of the diff engine for one upstream
///
/// `changes` holds the tagged instances to push:
/// - `enabled && changed`: same host:port, weight taken from discovery
/// - `enabled && !changed`: new member absent from the gateway
/// - `!enabled`: gateway member with no discovery counterpart
///
/// `canonical` is the full discovery-side list for backends that rewrite an
/// upstream wholesale.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiffPlan {
    pub changes: Vec<Instance>,
    pub canonical: Vec<Instance>,
}

impl DiffPlan {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn additions(&self) -> impl Iterator<Item = &Instance> {
        self.changes.iter().filter(|i| i.enabled && !i.changed)
    }

    pub fn updates(&self) -> impl Iterator<Item = &Instance> {
        self.changes.iter().filter(|i| i.enabled && i.changed)
    }

    pub fn removals(&self) -> impl Iterator<Item = &Instance> {
        self.changes.iter().filter(|i| !i.enabled)
    }
}

/// Field an override rule is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchType {
    #[default]
    Metadata,
    Ip,
}

impl MatchType {
    fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "IP" => MatchType::Ip,
            _ => MatchType::Metadata,
        }
    }
}

/// Desired registration status for a set of instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OverrideStatus {
    #[default]
    Up,
    Down,
    /// Leave the instance as it is
    Origin,
}

impl OverrideStatus {
    /// Status for matching instances: anything but DOWN means UP
    fn parse_status(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "DOWN" => OverrideStatus::Down,
            _ => OverrideStatus::Up,
        }
    }

    /// Status for non-matching instances: anything but UP/DOWN means ORIGIN
    fn parse_other_status(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "UP" => OverrideStatus::Up,
            "DOWN" => OverrideStatus::Down,
            _ => OverrideStatus::Origin,
        }
    }

    /// Enabled flag to push, or `None` to leave the instance untouched
    pub fn enabled(self) -> Option<bool> {
        match self {
            OverrideStatus::Up => Some(true),
            OverrideStatus::Down => Some(false),
            OverrideStatus::Origin => None,
        }
    }
}

/// Raw JSON form of a registry override request
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RegistrationForm {
    r#type: String,
    regexp_str: String,
    metadata_key: String,
    status: String,
    other_status: String,
    service_name: String,
    ext_data: HashMap<String, String>,
}

/// Registry override request
///
/// Marks instances of `service_name` whose metadata value (or ip) matches
/// `regexp_str` with `status`, and every other instance with `other_status`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RegistrationForm", rename_all = "camelCase")]
pub struct Registration {
    pub match_type: MatchType,
    pub regexp_str: String,
    pub metadata_key: String,
    pub status: OverrideStatus,
    pub other_status: OverrideStatus,
    pub service_name: String,
    pub ext_data: HashMap<String, String>,
}

impl From<RegistrationForm> for Registration {
    fn from(form: RegistrationForm) -> Self {
        Self {
            match_type: MatchType::parse(&form.r#type),
            regexp_str: form.regexp_str,
            metadata_key: form.metadata_key,
            status: OverrideStatus::parse_status(&form.status),
            other_status: OverrideStatus::parse_other_status(&form.other_status),
            service_name: form.service_name,
            ext_data: form.ext_data,
        }
    }
}
