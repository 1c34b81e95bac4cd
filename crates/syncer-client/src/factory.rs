//! Build backend clients from configuration

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::info;

use syncer_common::{
    DiscoveryClient, DiscoveryServer, GatewayClient, GatewayServer, Result, SyncerError,
};

use crate::discovery::{EurekaClient, NacosClient, eureka, nacos};
use crate::gateway::{ApisixClient, KongClient, apisix, kong};
use crate::http::{AdminHttpClient, HttpClientConfig};

pub type DiscoveryClients = HashMap<String, Arc<dyn DiscoveryClient>>;
pub type GatewayClients = HashMap<String, Arc<dyn GatewayClient>>;

fn prefix_or(prefix: &str, default: &str) -> String {
    if prefix.is_empty() {
        default.to_string()
    } else {
        prefix.to_string()
    }
}

fn http_client(config: HttpClientConfig) -> Result<AdminHttpClient> {
    AdminHttpClient::new(config).map_err(|e| SyncerError::ConfigInvalid(e.to_string()))
}

/// Create the client for one discovery server
pub fn build_discovery_client(server: &DiscoveryServer) -> Result<Arc<dyn DiscoveryClient>> {
    let client: Arc<dyn DiscoveryClient> = match server.r#type.as_str() {
        "nacos" => {
            let config =
                HttpClientConfig::new(&server.host, &prefix_or(&server.prefix, nacos::DEFAULT_PREFIX));
            Arc::new(NacosClient::new(http_client(config)?))
        }
        "eureka" => {
            let config =
                HttpClientConfig::new(&server.host, &prefix_or(&server.prefix, eureka::DEFAULT_PREFIX));
            Arc::new(EurekaClient::new(http_client(config)?, server.weight))
        }
        other => return Err(SyncerError::BackendUnsupported(other.to_string())),
    };
    Ok(client)
}

/// Create the client for one gateway server
pub fn build_gateway_client(server: &GatewayServer) -> Result<Arc<dyn GatewayClient>> {
    let client: Arc<dyn GatewayClient> = match server.r#type.as_str() {
        "apisix" => {
            let mut config = HttpClientConfig::new(
                &server.admin_url,
                &prefix_or(&server.prefix, apisix::DEFAULT_PREFIX),
            );
            if let Some(key) = server.config.get(apisix::API_KEY_HEADER) {
                config = config.with_header(apisix::API_KEY_HEADER, key);
            }
            Arc::new(ApisixClient::new(http_client(config)?))
        }
        "kong" => {
            let config = HttpClientConfig::new(
                &server.admin_url,
                &prefix_or(&server.prefix, kong::DEFAULT_PREFIX),
            );
            Arc::new(KongClient::new(http_client(config)?))
        }
        other => return Err(SyncerError::BackendUnsupported(other.to_string())),
    };
    Ok(client)
}

/// Create every configured discovery client, keyed by server name
pub fn build_discovery_clients(
    servers: &BTreeMap<String, DiscoveryServer>,
) -> Result<DiscoveryClients> {
    servers
        .iter()
        .map(|(name, server)| {
            let client = build_discovery_client(server)?;
            info!(name = %name, kind = client.kind(), "discovery client ready");
            Ok((name.clone(), client))
        })
        .collect()
}

/// Create every configured gateway client, keyed by server name
pub fn build_gateway_clients(servers: &BTreeMap<String, GatewayServer>) -> Result<GatewayClients> {
    servers
        .iter()
        .map(|(name, server)| {
            let client = build_gateway_client(server)?;
            info!(name = %name, kind = client.kind(), "gateway client ready");
            Ok((name.clone(), client))
        })
        .collect()
}
