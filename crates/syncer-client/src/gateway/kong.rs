//! Kong admin API client
//!
//! Kong targets are updated incrementally from the plan: stale or reweighted
//! targets are deleted first, then enabled ones are (re)added.

use async_trait::async_trait;
use dashmap::DashSet;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use syncer_common::{DiffPlan, GatewayClient, Instance, Result, SyncerError};

use crate::http::{AdminHttpClient, HttpError};
use crate::template;

pub const DEFAULT_PREFIX: &str = "/upstreams/";

pub const AUTO_TAG: &str = "discovery-syncer-auto";

pub const DEFAULT_UPSTREAM_TEMPLATE: &str = r#"{
    "name": "{{.Name}}",
    "tags": ["discovery-syncer-auto"]
}"#;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TargetList {
    data: Vec<KongTarget>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KongTarget {
    target: String,
    weight: f64,
}

impl KongTarget {
    fn to_instance(&self) -> Option<Instance> {
        let (host, port) = self.target.rsplit_once(':')?;
        Some(Instance::new(host, port.parse().ok()?, self.weight))
    }
}

fn sync_failed(e: HttpError) -> SyncerError {
    SyncerError::SyncFailed(e.to_string())
}

pub struct KongClient {
    http: AdminHttpClient,
    missing_upstreams: DashSet<String>,
}

impl KongClient {
    pub fn new(http: AdminHttpClient) -> Self {
        Self {
            http,
            missing_upstreams: DashSet::new(),
        }
    }

    pub fn is_missing(&self, upstream_name: &str) -> bool {
        self.missing_upstreams.contains(upstream_name)
    }

    async fn create_upstream(&self, upstream_name: &str, template: Option<&str>) -> Result<()> {
        let body = template::render(
            template.unwrap_or(DEFAULT_UPSTREAM_TEMPLATE),
            upstream_name,
            "{}",
        );
        self.http
            .send(Method::PUT, upstream_name, &[], Some(body))
            .await
            .map_err(sync_failed)?;
        self.missing_upstreams.remove(upstream_name);
        info!(upstream = upstream_name, "created kong upstream");
        Ok(())
    }

    async fn delete_target(&self, upstream_name: &str, instance: &Instance) -> Result<()> {
        let path = format!("{}/targets/{}", upstream_name, instance.address());
        let response = self
            .http
            .execute(Method::DELETE, &path, &[], None)
            .await
            .map_err(sync_failed)?;
        if response.is_success() || response.is_not_found() {
            Ok(())
        } else {
            Err(SyncerError::SyncFailed(format!(
                "DELETE {} returned {}: {}",
                self.http.url(&path),
                response.status,
                response.body
            )))
        }
    }

    async fn add_target(&self, upstream_name: &str, instance: &Instance) -> Result<()> {
        let body = json!({
            "target": instance.address(),
            "weight": instance.weight.round() as i64,
            "tags": [AUTO_TAG],
        });
        self.http
            .send(
                Method::POST,
                &format!("{}/targets/", upstream_name),
                &[],
                Some(body.to_string()),
            )
            .await
            .map_err(sync_failed)?;
        Ok(())
    }
}

#[async_trait]
impl GatewayClient for KongClient {
    fn kind(&self) -> &'static str {
        "kong"
    }

    async fn list_upstream_instances(&self, upstream_name: &str) -> Result<Vec<Instance>> {
        let response: Option<TargetList> = self
            .http
            .get_json(&format!("{}/targets/all/", upstream_name), &[])
            .await
            .map_err(|e| SyncerError::GatewayUnavailable(e.to_string()))?;

        let Some(targets) = response else {
            self.missing_upstreams.insert(upstream_name.to_string());
            return Ok(Vec::new());
        };
        self.missing_upstreams.remove(upstream_name);

        let instances: Vec<Instance> = targets
            .data
            .iter()
            .filter_map(KongTarget::to_instance)
            .collect();
        debug!(upstream = upstream_name, count = instances.len(), "fetched kong targets");
        Ok(instances)
    }

    async fn sync_instances(
        &self,
        upstream_name: &str,
        template: Option<&str>,
        plan: &DiffPlan,
    ) -> Result<()> {
        if plan.changes.is_empty() && plan.canonical.is_empty() {
            return Ok(());
        }

        if self.is_missing(upstream_name) {
            self.create_upstream(upstream_name, template).await?;
        }

        for instance in plan.changes.iter().filter(|i| !i.enabled || i.changed) {
            self.delete_target(upstream_name, instance).await?;
        }
        for instance in plan.changes.iter().filter(|i| i.enabled) {
            self.add_target(upstream_name, instance).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_parsing() {
        let list: TargetList = serde_json::from_str(
            r#"{"data":[{"target":"10.0.0.1:8080","weight":100},{"target":"broken","weight":1}],"next":null}"#,
        )
        .unwrap();
        let instances: Vec<Instance> = list.data.iter().filter_map(KongTarget::to_instance).collect();
        assert_eq!(instances, vec![Instance::new("10.0.0.1", 8080, 100.0)]);
    }

    #[test]
    fn test_default_template_renders_name() {
        let body = template::render(DEFAULT_UPSTREAM_TEMPLATE, "nacos1-order", "{}");
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["name"], "nacos1-order");
        assert_eq!(value["tags"][0], AUTO_TAG);
    }
}
