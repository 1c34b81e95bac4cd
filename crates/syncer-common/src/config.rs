//! Configuration document schema
//!
//! The document names every discovery server and gateway server once and
//! pairs them up in `targets`. Loading fails closed: any dangling reference,
//! empty collection or malformed value rejects the whole document.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncerError};
use crate::schedule::{FetchSchedule, parse_schedule};
use crate::traits::Options;
use crate::{DEFAULT_FETCH_INTERVAL, DEFAULT_MAXIMUM_INTERVAL_SEC, TEMPLATE_KEY};

static HOST_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^http(s)?://(.*@)?[\w\-._:]+$").expect("host pattern is valid")
});
static PREFIX_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/[/\w\-.]+/$").expect("prefix pattern is valid"));
static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w\-.]+$").expect("name pattern is valid"));

fn invalid(message: impl Into<String>) -> SyncerError {
    SyncerError::ConfigInvalid(message.into())
}

/// Logging sink settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct LoggerConfig {
    pub level: String,
    /// `console` or `file`
    pub logger: String,
    pub log_file: String,
    /// Rotation period: `y`, `m`, `d` or `h`
    pub date_slice: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            logger: "console".to_string(),
            log_file: String::new(),
            date_slice: "y".to_string(),
        }
    }
}

impl LoggerConfig {
    pub fn is_file(&self) -> bool {
        self.logger == "file"
    }

    fn normalize(&mut self) -> Result<()> {
        match self.logger.as_str() {
            "console" => {}
            "file" if self.log_file.is_empty() => {
                return Err(invalid("logger 'file' requires log-file"));
            }
            "file" => {}
            other => {
                return Err(invalid(format!(
                    "unsupported logger '{}', use console or file",
                    other
                )));
            }
        }
        if !matches!(self.date_slice.as_str(), "y" | "m" | "d" | "h") {
            self.date_slice = "y".to_string();
        }
        Ok(())
    }
}

fn default_weight() -> f64 {
    1.0
}

/// Discovery server definition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct DiscoveryServer {
    pub r#type: String,
    pub host: String,
    #[serde(default)]
    pub prefix: String,
    /// Weight assigned to instances of registries that carry none
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl DiscoveryServer {
    fn validate(&self, name: &str) -> Result<()> {
        if !(0.0..=100.0).contains(&self.weight) {
            return Err(invalid(format!(
                "discovery '{}': weight must between 0 ~ 100",
                name
            )));
        }
        if self.host.is_empty() {
            return Err(invalid(format!("discovery '{}': host must not be empty", name)));
        }
        if !HOST_PATTERN.is_match(&self.host) {
            return Err(invalid(format!("discovery '{}': invalid host url", name)));
        }
        if !self.prefix.is_empty() && !PREFIX_PATTERN.is_match(&self.prefix) {
            return Err(invalid(format!("discovery '{}': invalid prefix", name)));
        }
        Ok(())
    }
}

/// Gateway server definition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct GatewayServer {
    pub r#type: String,
    pub admin_url: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub config: HashMap<String, String>,
}

impl GatewayServer {
    fn validate(&self, name: &str) -> Result<()> {
        if !HOST_PATTERN.is_match(&self.admin_url) {
            return Err(invalid(format!("gateway '{}': invalid admin url", name)));
        }
        if !self.prefix.is_empty() && !PREFIX_PATTERN.is_match(&self.prefix) {
            return Err(invalid(format!("gateway '{}': invalid prefix", name)));
        }
        Ok(())
    }
}

/// One (discovery, gateway) pairing with its own schedule and policy
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Target {
    pub discovery: String,
    pub gateway: String,
    /// Key used for health tracking and logging
    pub name: String,
    pub enabled: bool,
    /// Regular expressions searched in service names
    pub exclude_service: Vec<String>,
    pub upstream_prefix: String,
    pub fetch_interval: String,
    /// Staleness threshold in seconds
    pub maximum_interval_sec: i64,
    pub config: HashMap<String, String>,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            discovery: String::new(),
            gateway: String::new(),
            name: String::new(),
            enabled: false,
            exclude_service: Vec::new(),
            upstream_prefix: String::new(),
            fetch_interval: DEFAULT_FETCH_INTERVAL.to_string(),
            maximum_interval_sec: DEFAULT_MAXIMUM_INTERVAL_SEC,
            config: HashMap::new(),
        }
    }
}

impl Target {
    pub fn new(discovery: &str, gateway: &str) -> Self {
        let mut target = Self {
            discovery: discovery.to_string(),
            gateway: gateway.to_string(),
            enabled: true,
            ..Default::default()
        };
        target.apply_defaults();
        target
    }

    fn apply_defaults(&mut self) {
        if self.maximum_interval_sec <= 0 {
            self.maximum_interval_sec = DEFAULT_MAXIMUM_INTERVAL_SEC;
        }
        if self.name.is_empty() {
            self.name = format!("{}-{}", self.discovery, self.gateway);
        }
        if self.upstream_prefix.is_empty() {
            self.upstream_prefix = self.discovery.clone();
        }
        if self.fetch_interval.trim().is_empty() {
            self.fetch_interval = DEFAULT_FETCH_INTERVAL.to_string();
        }
    }

    /// Stable key used for health tracking and logging
    pub fn key(&self) -> &str {
        &self.name
    }

    /// Run schedule parsed from `fetch-interval`
    pub fn schedule(&self) -> Result<FetchSchedule> {
        parse_schedule(&self.fetch_interval)
    }

    /// Gateway upstream-creation template, if configured
    pub fn template(&self) -> Option<&str> {
        self.config
            .get(TEMPLATE_KEY)
            .map(String::as_str)
            .filter(|t| !t.trim().is_empty())
    }

    /// Options forwarded to the discovery backend
    pub fn discovery_options(&self) -> Options {
        self.config
            .iter()
            .filter(|(k, _)| k.as_str() != TEMPLATE_KEY)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if !NAME_PATTERN.is_match(&self.discovery) {
            return Err(invalid(format!(
                "target '{}': invalid discovery name",
                self.name
            )));
        }
        if !NAME_PATTERN.is_match(&self.gateway) {
            return Err(invalid(format!("target '{}': invalid gateway name", self.name)));
        }
        for pattern in &self.exclude_service {
            Regex::new(pattern).map_err(|e| {
                invalid(format!(
                    "target '{}': invalid exclude-service '{}': {}",
                    self.name, pattern, e
                ))
            })?;
        }
        self.schedule().map_err(|e| match e {
            SyncerError::ConfigInvalid(message) => {
                invalid(format!("target '{}': {}", self.name, message))
            }
            other => other,
        })?;
        Ok(())
    }
}

/// The whole configuration document
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct SyncerConfig {
    /// Accepted for compatibility with older documents; there is no profiling endpoint
    pub enable_pprof: bool,
    pub logger: LoggerConfig,
    pub discovery_servers: BTreeMap<String, DiscoveryServer>,
    pub gateway_servers: BTreeMap<String, GatewayServer>,
    pub targets: Vec<Target>,
}

impl SyncerConfig {
    /// Parse, apply defaults and validate a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let mut config: SyncerConfig =
            serde_yaml::from_str(content).map_err(|e| invalid(e.to_string()))?;
        config.normalize()?;
        config.validate()?;
        Ok(config)
    }

    fn normalize(&mut self) -> Result<()> {
        self.logger.normalize()?;
        for target in &mut self.targets {
            target.apply_defaults();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(invalid("targets must not be empty"));
        }
        if self.discovery_servers.is_empty() {
            return Err(invalid("discovery-servers must not be empty"));
        }
        if self.gateway_servers.is_empty() {
            return Err(invalid("gateway-servers must not be empty"));
        }
        for (name, server) in &self.discovery_servers {
            server.validate(name)?;
        }
        for (name, server) in &self.gateway_servers {
            server.validate(name)?;
        }
        for target in &self.targets {
            target.validate()?;
            if !self.discovery_servers.contains_key(&target.discovery) {
                return Err(invalid(format!("discovery {} not exist", target.discovery)));
            }
            if !self.gateway_servers.contains_key(&target.gateway) {
                return Err(invalid(format!("gateway {} not exist", target.gateway)));
            }
        }
        Ok(())
    }

    /// Targets that will be scheduled
    pub fn enabled_targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter().filter(|t| t.enabled)
    }
}
