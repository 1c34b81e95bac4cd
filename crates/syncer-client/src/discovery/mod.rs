//! Discovery source backends

pub mod eureka;
pub mod nacos;

pub use eureka::EurekaClient;
pub use nacos::NacosClient;
