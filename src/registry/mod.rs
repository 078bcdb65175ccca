// Client registry: id -> record plus id -> live connection, behind one lock

pub mod store;
pub mod sweep;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, oneshot};

use crate::models::{ClientRecord, MetricSnapshot};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("client {0} not found")]
    NotFound(String),
}

/// Live transport handle. Dropping `close` (or sending on it) tells the
/// owning connection task to shut its socket.
#[derive(Debug)]
struct ConnHandle {
    serial: u64,
    close: oneshot::Sender<()>,
}

impl ConnHandle {
    fn close(self) {
        let _ = self.close.send(());
    }
}

/// Returned to a connection task when it binds to a client id.
#[derive(Debug)]
pub struct Binding {
    pub serial: u64,
    /// Resolves when the registry wants this connection closed
    /// (pre-empted by a newer connection, deregistered, or swept as stale).
    pub closed: oneshot::Receiver<()>,
}

#[derive(Debug, Default)]
struct Inner {
    clients: HashMap<String, ClientRecord>,
    conns: HashMap<String, ConnHandle>,
}

/// Authoritative client state.
///
/// Records and live connection handles share a single lock: a handle is
/// present for an id exactly when that record is `connected`, outside of the
/// critical sections below. Readers always get copies.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    inner: RwLock<Inner>,
    next_serial: AtomicU64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from persisted records. Every record starts disconnected, and a
    /// record whose id field is empty or stale takes its map key. Returns the
    /// registry and whether any record needed repair.
    pub fn from_records(records: HashMap<String, ClientRecord>) -> (Self, bool) {
        let mut repaired = false;
        let clients = records
            .into_iter()
            .map(|(key, mut record)| {
                if record.id != key {
                    tracing::info!(client_id = %key, "repairing client id field");
                    record.id = key.clone();
                    repaired = true;
                }
                record.mark_disconnected();
                (key, record)
            })
            .collect();
        let registry = Self {
            inner: RwLock::new(Inner {
                clients,
                conns: HashMap::new(),
            }),
            next_serial: AtomicU64::new(0),
        };
        (registry, repaired)
    }

    /// Create a disconnected, zeroed record ordered after every existing one.
    pub async fn register(&self, name: &str) -> ClientRecord {
        let mut inner = self.inner.write().await;
        let mut seed = now_nanos();
        let id = loop {
            let candidate = generate_id(seed);
            if !inner.clients.contains_key(&candidate) {
                break candidate;
            }
            seed = seed.wrapping_add(1);
        };
        let order = inner
            .clients
            .values()
            .map(|c| c.display_order)
            .max()
            .unwrap_or(0)
            .saturating_add(1);
        let record = ClientRecord::new(id.clone(), name, order);
        inner.clients.insert(id.clone(), record.clone());
        tracing::info!(client_id = %id, name, display_order = order, "client registered");
        record
    }

    /// Remove the record and close its live connection, if any.
    pub async fn deregister(&self, id: &str) -> Option<ClientRecord> {
        let mut inner = self.inner.write().await;
        let removed = inner.clients.remove(id);
        if let Some(handle) = inner.conns.remove(id) {
            handle.close();
        }
        if removed.is_some() {
            tracing::info!(client_id = %id, "client deregistered");
        }
        removed
    }

    pub async fn rename(&self, id: &str, name: &str) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().await;
        let record = inner
            .clients
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        record.name = name.to_string();
        Ok(())
    }

    /// Bulk display-order update. Unknown ids are skipped; returns how many were applied.
    pub async fn reorder(&self, orders: &HashMap<String, i64>) -> usize {
        let mut inner = self.inner.write().await;
        let mut applied = 0;
        for (id, order) in orders {
            if let Some(record) = inner.clients.get_mut(id) {
                record.display_order = *order;
                applied += 1;
            }
        }
        applied
    }

    /// Copy metric fields into the record. No-op for unknown ids so a late
    /// report cannot resurrect a deregistered client.
    pub async fn apply_snapshot(&self, id: &str, snapshot: MetricSnapshot) -> bool {
        let mut inner = self.inner.write().await;
        match inner.clients.get_mut(id) {
            Some(record) => {
                record.metrics = snapshot.sanitized();
                true
            }
            None => false,
        }
    }

    pub async fn mark_seen(&self, id: &str, now: DateTime<Utc>) -> bool {
        let mut inner = self.inner.write().await;
        match inner.clients.get_mut(id) {
            Some(record) => {
                record.mark_seen(now);
                true
            }
            None => false,
        }
    }

    /// `apply_snapshot` and `mark_seen` in one critical section, but only for
    /// the connection that currently owns the id.
    pub async fn report(&self, id: &str, serial: u64, snapshot: MetricSnapshot, now: DateTime<Utc>) -> bool {
        let mut inner = self.inner.write().await;
        if inner.conns.get(id).map(|h| h.serial) != Some(serial) {
            return false;
        }
        match inner.clients.get_mut(id) {
            Some(record) => {
                record.metrics = snapshot.sanitized();
                record.mark_seen(now);
                true
            }
            None => false,
        }
    }

    /// Attach a new connection to a registered id, closing any previous one.
    /// Returns `None` when the id is not registered.
    pub async fn bind(&self, id: &str, now: DateTime<Utc>) -> Option<Binding> {
        let mut inner = self.inner.write().await;
        let record = inner.clients.get_mut(id)?;
        record.mark_seen(now);
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        if let Some(old) = inner.conns.insert(id.to_string(), ConnHandle { serial, close: tx }) {
            tracing::info!(client_id = %id, replaced = old.serial, "pre-empting previous connection");
            old.close();
        }
        Some(Binding { serial, closed: rx })
    }

    /// Detach a connection on close. Only the current owner of the id is
    /// detached; a connection that was already pre-empted or removed leaves
    /// the record alone. Returns whether the record was marked disconnected.
    pub async fn release(&self, id: &str, serial: u64) -> bool {
        let mut inner = self.inner.write().await;
        if inner.conns.get(id).map(|h| h.serial) != Some(serial) {
            return false;
        }
        inner.conns.remove(id);
        if let Some(record) = inner.clients.get_mut(id) {
            record.mark_disconnected();
        }
        true
    }

    /// Mark connected records silent for longer than `timeout` as
    /// disconnected with zeroed metrics, closing any handle they still hold.
    /// Returns the ids that were flipped.
    pub async fn sweep_stale(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> Vec<String> {
        let mut inner = self.inner.write().await;
        let Inner { clients, conns } = &mut *inner;
        let mut flipped = Vec::new();
        for (id, record) in clients.iter_mut() {
            let stale = record
                .last_seen
                .is_none_or(|seen| now.signed_duration_since(seen) > timeout);
            if record.connected && stale {
                record.mark_disconnected();
                if let Some(handle) = conns.remove(id) {
                    handle.close();
                }
                flipped.push(id.clone());
            }
        }
        flipped
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.read().await.clients.contains_key(id)
    }

    pub async fn get(&self, id: &str) -> Option<ClientRecord> {
        self.inner.read().await.clients.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.clients.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.clients.is_empty()
    }

    pub async fn is_bound(&self, id: &str) -> bool {
        self.inner.read().await.conns.contains_key(id)
    }

    /// Records ordered by display order, then id.
    pub async fn list(&self) -> Vec<ClientRecord> {
        let mut records: Vec<ClientRecord> =
            self.inner.read().await.clients.values().cloned().collect();
        records.sort_by(|a, b| a.display_order.cmp(&b.display_order).then_with(|| a.id.cmp(&b.id)));
        records
    }

    /// Copy of the id -> record map for persistence.
    pub async fn export(&self) -> HashMap<String, ClientRecord> {
        self.inner.read().await.clients.clone()
    }
}

fn now_nanos() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}

/// Ten-character id: two letters then eight digits, derived from `seed`.
pub fn generate_id(seed: u128) -> String {
    const LETTERS: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let c1 = LETTERS[(seed % 26) as usize] as char;
    let c2 = LETTERS[((seed / 26) % 26) as usize] as char;
    format!("{}{}{:08}", c1, c2, seed % 100_000_000)
}
