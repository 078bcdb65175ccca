// Library for the binaries and tests to access modules

pub mod agent;
pub mod auth;
pub mod config;
pub mod models;
pub mod registry;
pub mod routes;
pub mod sysinfo_repo;
pub mod telemetry;
