//! Syncer Client - backend admin API clients
//!
//! Concrete implementations of the discovery and gateway contracts:
//! - Nacos and Eureka registries as discovery sources
//! - APISIX and Kong admin APIs as gateway sinks
//! - Factories turning configuration maps into shared client handles

pub mod discovery;
pub mod factory;
pub mod gateway;
pub mod http;
pub mod template;

pub use discovery::{EurekaClient, NacosClient};
pub use factory::{
    DiscoveryClients, GatewayClients, build_discovery_client, build_discovery_clients,
    build_gateway_client, build_gateway_clients,
};
pub use gateway::{ApisixClient, KongClient};
pub use http::{AdminHttpClient, HttpClientConfig, HttpError};
