//! Apache APISIX admin API client
//!
//! Upstreams are rewritten wholesale: the member map is rebuilt from the
//! canonical discovery list on every sync. Upstream ids are cached by name so
//! steady-state reads and writes address a single upstream.

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Method;
use serde_json::{Map, Value};
use tracing::{debug, info};

use syncer_common::{DiffPlan, GatewayClient, Instance, Result, SyncerError};

use crate::http::{AdminHttpClient, HttpError};
use crate::template;

pub const DEFAULT_PREFIX: &str = "/apisix/admin/";

/// Admin key header, read from the gateway `config` map
pub const API_KEY_HEADER: &str = "X-API-KEY";

const UPSTREAMS: &str = "upstreams";

pub const DEFAULT_UPSTREAM_TEMPLATE: &str = r#"{
    "timeout": {
        "connect": 30,
        "send": 30,
        "read": 30
    },
    "name": "{{.Name}}",
    "nodes": {{.Nodes}},
    "type": "roundrobin",
    "desc": "auto sync by discovery-syncer"
}"#;

#[derive(Debug, Default, PartialEq)]
struct Upstream {
    id: String,
    name: String,
    nodes: Vec<Instance>,
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_nodes(nodes: &Value) -> Vec<Instance> {
    match nodes {
        Value::Array(items) => items
            .iter()
            .filter_map(|node| {
                let host = node.get("host")?.as_str()?;
                let port = node.get("port")?.as_u64()?;
                let weight = node.get("weight").and_then(Value::as_f64).unwrap_or(1.0);
                Some(Instance::new(host, u16::try_from(port).ok()?, weight))
            })
            .collect(),
        Value::Object(map) => map
            .iter()
            .filter_map(|(address, weight)| {
                let (host, port) = address.rsplit_once(':')?;
                Some(Instance::new(
                    host,
                    port.parse().ok()?,
                    weight.as_f64().unwrap_or(1.0),
                ))
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_upstream(value: &Value) -> Option<Upstream> {
    let value = value.get("value").unwrap_or(value);
    let id = value.get("id").and_then(text)?;
    Some(Upstream {
        name: value.get("name").and_then(text).unwrap_or_default(),
        nodes: value.get("nodes").map(parse_nodes).unwrap_or_default(),
        id,
    })
}

/// Accepts v3 list, v2 etcd list and single-object envelopes
fn parse_upstreams(body: &Value) -> Vec<Upstream> {
    let items = body
        .get("list")
        .or_else(|| body.get("node").and_then(|n| n.get("nodes")))
        .and_then(Value::as_array);
    if let Some(items) = items {
        return items.iter().filter_map(parse_upstream).collect();
    }

    let single = body
        .get("value")
        .map(|_| body)
        .or_else(|| body.get("node").filter(|n| n.get("value").is_some()));
    single.and_then(parse_upstream).into_iter().collect()
}

fn weight_value(weight: f64) -> Value {
    if weight.fract() == 0.0 && weight.abs() < i64::MAX as f64 {
        Value::from(weight as i64)
    } else {
        Value::from(weight)
    }
}

/// `{"host:port": weight}` map of the canonical members
fn nodes_json(plan: &DiffPlan) -> String {
    let nodes: Map<String, Value> = plan
        .canonical
        .iter()
        .map(|i| (i.address(), weight_value(i.weight)))
        .collect();
    Value::Object(nodes).to_string()
}

fn sync_failed(e: HttpError) -> SyncerError {
    SyncerError::SyncFailed(e.to_string())
}

pub struct ApisixClient {
    http: AdminHttpClient,
    upstream_ids: DashMap<String, String>,
}

impl ApisixClient {
    pub fn new(http: AdminHttpClient) -> Self {
        Self {
            http,
            upstream_ids: DashMap::new(),
        }
    }

    /// Cached id of an upstream, if it has been seen
    pub fn cached_id(&self, upstream_name: &str) -> Option<String> {
        self.upstream_ids.get(upstream_name).map(|id| id.clone())
    }

    async fn fetch(&self, path: &str) -> Result<Vec<Upstream>> {
        let body: Option<Value> = self
            .http
            .get_json(path, &[])
            .await
            .map_err(|e| SyncerError::GatewayUnavailable(e.to_string()))?;
        Ok(body.as_ref().map(parse_upstreams).unwrap_or_default())
    }
}

#[async_trait]
impl GatewayClient for ApisixClient {
    fn kind(&self) -> &'static str {
        "apisix"
    }

    async fn list_upstream_instances(&self, upstream_name: &str) -> Result<Vec<Instance>> {
        if let Some(id) = self.cached_id(upstream_name) {
            let upstreams = self.fetch(&format!("{}/{}", UPSTREAMS, id)).await?;
            if upstreams.is_empty() {
                // deleted behind our back, recreate on the next sync
                self.upstream_ids.remove(upstream_name);
            }
            return Ok(upstreams.into_iter().flat_map(|u| u.nodes).collect());
        }

        let mut found = Vec::new();
        for upstream in self.fetch(UPSTREAMS).await? {
            if upstream.name.is_empty() {
                continue;
            }
            self.upstream_ids
                .insert(upstream.name.clone(), upstream.id.clone());
            if upstream.name == upstream_name {
                found = upstream.nodes;
            }
        }
        debug!(upstream = upstream_name, count = found.len(), "fetched apisix upstream");
        Ok(found)
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

        let nodes = nodes_json(plan);
        match self.cached_id(upstream_name) {
            Some(id) => {
                self.http
                    .send(
                        Method::PATCH,
                        &format!("{}/{}/nodes", UPSTREAMS, id),
                        &[],
                        Some(nodes),
                    )
                    .await
                    .map_err(sync_failed)?;
            }
            None => {
                let body = template::render(
                    template.unwrap_or(DEFAULT_UPSTREAM_TEMPLATE),
                    upstream_name,
                    &nodes,
                );
                self.http
                    .send(
                        Method::PUT,
                        &format!("{}/{}", UPSTREAMS, upstream_name),
                        &[],
                        Some(body),
                    )
                    .await
                    .map_err(sync_failed)?;
                self.upstream_ids
                    .insert(upstream_name.to_string(), upstream_name.to_string());
                info!(upstream = upstream_name, "created apisix upstream");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_v3_list_with_node_array() {
        let body = json!({"total": 1, "list": [{"key": "/apisix/upstreams/1", "value": {
            "id": "1", "name": "nacos1-order",
            "nodes": [{"host": "10.0.0.1", "port": 80, "weight": 1}]}}]});
        let upstreams = parse_upstreams(&body);
        assert_eq!(upstreams.len(), 1);
        assert_eq!(upstreams[0].id, "1");
        assert_eq!(upstreams[0].nodes, vec![Instance::new("10.0.0.1", 80, 1.0)]);
    }

    #[test]
    fn test_parse_v2_list_with_node_map() {
        let body = json!({"node": {"nodes": [{"value": {
            "id": 42, "name": "eureka1-pay", "nodes": {"10.0.0.2:8080": 5}}}]}});
        let upstreams = parse_upstreams(&body);
        assert_eq!(upstreams[0].id, "42");
        assert_eq!(upstreams[0].name, "eureka1-pay");
        assert_eq!(upstreams[0].nodes, vec![Instance::new("10.0.0.2", 8080, 5.0)]);
    }

    #[test]
    fn test_parse_single_envelopes() {
        let v3 = json!({"key": "/apisix/upstreams/a", "value": {"id": "a", "name": "a", "nodes": {}}});
        assert_eq!(parse_upstreams(&v3).len(), 1);

        let v2 = json!({"node": {"value": {"id": "b", "name": "b", "nodes": []}}});
        assert_eq!(parse_upstreams(&v2)[0].id, "b");

        assert!(parse_upstreams(&json!({"list": []})).is_empty());
        assert!(parse_upstreams(&json!({})).is_empty());
    }

    #[test]
    fn test_nodes_json_uses_integer_weights() {
        let plan = DiffPlan {
            changes: vec![],
            canonical: vec![
                Instance::new("10.0.0.1", 80, 1.0),
                Instance::new("10.0.0.2", 80, 2.5),
            ],
        };
        let value: Value = serde_json::from_str(&nodes_json(&plan)).unwrap();
        assert_eq!(value, json!({"10.0.0.1:80": 1, "10.0.0.2:80": 2.5}));
    }
}
