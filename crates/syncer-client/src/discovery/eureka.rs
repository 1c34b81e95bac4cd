//! Eureka registry client

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Method;
use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use syncer_common::{DiscoveryClient, Instance, Options, Result, Service, SyncerError};

use crate::http::{AdminHttpClient, HttpError};

pub const DEFAULT_PREFIX: &str = "/eureka/";

static HOME_PAGE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?P<ip>[\w.\-]+):(?P<port>\d+)/?$").expect("home page pattern is valid")
});

/// Eureka renders single-element lists as bare objects
fn one_or_many<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }

    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        Some(OneOrMany::Many(items)) => items,
        Some(OneOrMany::One(item)) => vec![item],
        None => Vec::new(),
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApplicationsResponse {
    applications: Applications,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Applications {
    #[serde(deserialize_with = "one_or_many")]
    application: Vec<Application>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApplicationResponse {
    application: Application,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Application {
    name: String,
    #[serde(deserialize_with = "one_or_many")]
    instance: Vec<EurekaInstance>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct EurekaInstance {
    instance_id: String,
    home_page_url: String,
    status: String,
    ip_addr: String,
    port: PortField,
    metadata: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PortField {
    #[serde(rename = "$")]
    value: PortValue,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u16),
    Text(String),
}

impl Default for PortValue {
    fn default() -> Self {
        PortValue::Number(0)
    }
}

impl PortValue {
    fn as_port(&self) -> u16 {
        match self {
            PortValue::Number(port) => *port,
            PortValue::Text(text) => text.parse().unwrap_or_default(),
        }
    }
}

fn unavailable(e: HttpError) -> SyncerError {
    SyncerError::DiscoveryUnavailable(e.to_string())
}

pub struct EurekaClient {
    http: AdminHttpClient,
    weight: f64,
}

impl EurekaClient {
    /// `weight` is assigned to every instance, Eureka carries none
    pub fn new(http: AdminHttpClient, weight: f64) -> Self {
        Self { http, weight }
    }

    fn to_instances(&self, application: Application) -> Vec<Instance> {
        application
            .instance
            .into_iter()
            .filter(|i| i.status == "UP")
            .map(|i| {
                let (ip, port) = match HOME_PAGE_URL.captures(&i.home_page_url) {
                    Some(caps) => (
                        caps["ip"].to_string(),
                        caps["port"].parse().unwrap_or_else(|_| i.port.value.as_port()),
                    ),
                    None => (i.ip_addr.clone(), i.port.value.as_port()),
                };
                Instance {
                    ip,
                    port,
                    weight: self.weight,
                    metadata: i.metadata,
                    ext: HashMap::from([("instanceId".to_string(), i.instance_id)]),
                    ..Default::default()
                }
            })
            .collect()
    }
}

#[async_trait]
impl DiscoveryClient for EurekaClient {
    fn kind(&self) -> &'static str {
        "eureka"
    }

    async fn list_services(&self, _options: &Options) -> Result<Vec<Service>> {
        let response: Option<ApplicationsResponse> =
            self.http.get_json("apps", &[]).await.map_err(unavailable)?;

        Ok(response
            .map(|r| r.applications.application)
            .unwrap_or_default()
            .into_iter()
            .map(|app| {
                let name = app.name.clone();
                Service::with_instances(name, self.to_instances(app))
            })
            .collect())
    }

    async fn list_instances(&self, service_name: &str, _options: &Options) -> Result<Vec<Instance>> {
        let response: Option<ApplicationResponse> = self
            .http
            .get_json(&format!("apps/{}", service_name), &[])
            .await
            .map_err(unavailable)?;

        let instances = response
            .map(|r| self.to_instances(r.application))
            .unwrap_or_default();
        debug!(service = service_name, count = instances.len(), "fetched eureka instances");
        Ok(instances)
    }

    async fn apply_overrides(&self, service_name: &str, instances: &[Instance]) -> Result<()> {
        let mut failures = Vec::new();
        for instance in instances.iter().filter(|i| i.changed) {
            let Some(instance_id) = instance.ext.get("instanceId") else {
                failures.push(format!("{}: missing instanceId", instance.address()));
                continue;
            };
            let status = if instance.enabled { "UP" } else { "OUT_OF_SERVICE" };
            let path = format!("apps/{}/{}/status", service_name, instance_id);
            let query = [("value".to_string(), status.to_string())];

            if let Err(e) = self.http.send(Method::PUT, &path, &query, None).await {
                warn!(service = service_name, instance_id = %instance_id, error = %e, "failed to change eureka instance status");
                failures.push(format!("{}: {}", instance_id, e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SyncerError::DiscoveryUnavailable(failures.join("; ")))
        }
    }
}
