// Library for tests to access modules

pub mod config;
pub mod maintenance;
pub mod metrics_store;
pub mod models;
pub mod routes;
pub mod sampler;
pub mod source;
pub mod version;
pub mod worker;
