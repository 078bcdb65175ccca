// Registered client record (persisted) and its dashboard view

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MetricSnapshot;

/// Authoritative per-client state held by the registry and written to clients.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub metrics: MetricSnapshot,
    #[serde(default)]
    pub display_order: i64,
}

impl ClientRecord {
    /// Freshly registered client: disconnected, never seen, zeroed metrics.
    pub fn new(id: impl Into<String>, name: impl Into<String>, display_order: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            connected: false,
            last_seen: None,
            metrics: MetricSnapshot::default(),
            display_order,
        }
    }

    /// Disconnected display state shared by the close path and the liveness sweep.
    pub fn mark_disconnected(&mut self) {
        self.connected = false;
        self.metrics = MetricSnapshot::default();
    }

    pub fn mark_seen(&mut self, now: DateTime<Utc>) {
        self.connected = true;
        self.last_seen = Some(now);
    }
}

/// Dashboard row. The id is blanked for callers without a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientView {
    pub id: String,
    pub name: String,
    pub connected: bool,
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub metrics: MetricSnapshot,
    pub display_order: i64,
}

impl ClientView {
    pub fn from_record(record: ClientRecord, reveal_id: bool) -> Self {
        Self {
            id: if reveal_id { record.id } else { String::new() },
            name: record.name,
            connected: record.connected,
            last_seen: record.last_seen,
            metrics: record.metrics,
            display_order: record.display_order,
        }
    }
}
