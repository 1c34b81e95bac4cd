//! Gateway sink backends

pub mod apisix;
pub mod kong;

pub use apisix::ApisixClient;
pub use kong::KongClient;
