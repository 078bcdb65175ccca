// Domain models shared by the agent and the collector

mod client;
mod metrics;

pub use client::{ClientRecord, ClientView};
pub use metrics::{Gauges, MetricSnapshot};
