//! Nacos registry client (open API v1)

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, warn};

use syncer_common::{DiscoveryClient, Instance, Options, Result, Service, SyncerError};

use crate::http::{AdminHttpClient, HttpError, sorted_query};

pub const DEFAULT_PREFIX: &str = "/nacos/v1/";

const PAGE_SIZE: &str = "10000";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServiceListResponse {
    doms: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InstanceListResponse {
    hosts: Vec<NacosHost>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct NacosHost {
    ip: String,
    port: u16,
    weight: f64,
    metadata: HashMap<String, String>,
    ephemeral: bool,
    namespace_id: String,
    cluster_name: String,
    group_name: String,
    service_name: String,
}

fn unavailable(e: HttpError) -> SyncerError {
    SyncerError::DiscoveryUnavailable(e.to_string())
}

pub struct NacosClient {
    http: AdminHttpClient,
}

impl NacosClient {
    pub fn new(http: AdminHttpClient) -> Self {
        Self { http }
    }

    fn to_instance(host: NacosHost, options: &Options) -> Instance {
        let mut ext = HashMap::from([
            ("serviceName".to_string(), host.service_name),
            ("groupName".to_string(), host.group_name),
            ("clusterName".to_string(), host.cluster_name),
            ("namespaceId".to_string(), host.namespace_id),
            ("ephemeral".to_string(), host.ephemeral.to_string()),
        ]);
        ext.extend(options.iter().map(|(k, v)| (k.clone(), v.clone())));

        Instance {
            ip: host.ip,
            port: host.port,
            weight: host.weight,
            metadata: host.metadata,
            ext,
            ..Default::default()
        }
    }

    fn override_query(service_name: &str, instance: &Instance) -> Result<Vec<(String, String)>> {
        let metadata = serde_json::to_string(&instance.metadata)
            .map_err(|e| SyncerError::DiscoveryUnavailable(e.to_string()))?;

        let mut params = instance.ext.clone();
        params.insert("ip".to_string(), instance.ip.clone());
        params.insert("port".to_string(), instance.port.to_string());
        params.insert("weight".to_string(), format!("{:.2}", instance.weight));
        params.insert("enabled".to_string(), instance.enabled.to_string());
        params.insert("serviceName".to_string(), service_name.to_string());
        params.insert("metadata".to_string(), metadata);
        Ok(sorted_query(&params))
    }
}

#[async_trait]
impl DiscoveryClient for NacosClient {
    fn kind(&self) -> &'static str {
        "nacos"
    }

    async fn list_services(&self, options: &Options) -> Result<Vec<Service>> {
        let mut query = vec![
            ("pageNo".to_string(), "1".to_string()),
            ("pageSize".to_string(), PAGE_SIZE.to_string()),
        ];
        query.extend(sorted_query(options));

        let response: Option<ServiceListResponse> = self
            .http
            .get_json("ns/service/list", &query)
            .await
            .map_err(unavailable)?;

        Ok(response
            .map(|r| r.doms.into_iter().map(Service::new).collect())
            .unwrap_or_default())
    }

    async fn list_instances(&self, service_name: &str, options: &Options) -> Result<Vec<Instance>> {
        let mut params = options.clone();
        params.insert("serviceName".to_string(), service_name.to_string());

        let response: Option<InstanceListResponse> = self
            .http
            .get_json("ns/instance/list", &sorted_query(&params))
            .await
            .map_err(unavailable)?;

        let instances: Vec<Instance> = response
            .map(|r| r.hosts)
            .unwrap_or_default()
            .into_iter()
            .map(|host| Self::to_instance(host, options))
            .collect();
        debug!(service = service_name, count = instances.len(), "fetched nacos instances");
        Ok(instances)
    }

    async fn apply_overrides(&self, service_name: &str, instances: &[Instance]) -> Result<()> {
        let mut failures = Vec::new();
        for instance in instances.iter().filter(|i| i.changed) {
            let outcome = match Self::override_query(service_name, instance) {
                Ok(query) => self
                    .http
                    .send(Method::PUT, "ns/instance", &query, None)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            if let Err(e) = outcome {
                warn!(service = service_name, address = %instance.address(), error = %e, "failed to update nacos instance");
                failures.push(format!("{}: {}", instance.address(), e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SyncerError::DiscoveryUnavailable(failures.join("; ")))
        }
    }
}
