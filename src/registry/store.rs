// clients.json persistence: id -> ClientRecord, pretty JSON, atomic replace

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::Mutex;
use tracing::instrument;

use super::ClientRegistry;
use crate::models::ClientRecord;

/// JSON file written via temp file + rename. Saves are serialized so two
/// writers never interleave on the temp file.
#[derive(Debug)]
pub struct JsonFile {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when the file does not exist yet.
    pub async fn read<T: DeserializeOwned>(&self) -> anyhow::Result<Option<T>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(anyhow::anyhow!("read {}: {}", self.path.display(), e)),
        };
        let value = serde_json::from_slice(&bytes)
            .map_err(|e| anyhow::anyhow!("parse {}: {}", self.path.display(), e))?;
        Ok(Some(value))
    }

    pub async fn write<T: Serialize + ?Sized>(&self, value: &T) -> anyhow::Result<()> {
        let data = serde_json::to_vec_pretty(value)?;
        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Durable store for client registration metadata.
#[derive(Debug)]
pub struct ClientStore {
    file: JsonFile,
    persist_lock: Mutex<()>,
}

impl ClientStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
            persist_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Load all records; a missing file is created empty.
    #[instrument(skip(self), fields(repo = "clients", operation = "load"))]
    pub async fn load(&self) -> anyhow::Result<HashMap<String, ClientRecord>> {
        match self.file.read::<HashMap<String, ClientRecord>>().await? {
            Some(records) => {
                tracing::info!(clients = records.len(), path = %self.path().display(), "clients loaded");
                Ok(records)
            }
            None => {
                let empty = HashMap::new();
                self.save(&empty).await?;
                Ok(empty)
            }
        }
    }

    /// Copy the registry and write it out. Copy and write happen under one
    /// lock, so files land in the order their copies were taken and a later
    /// copy is never overwritten by an earlier one. The registry lock itself
    /// is released before any I/O.
    #[instrument(skip_all, fields(repo = "clients", operation = "persist"))]
    pub async fn persist(&self, registry: &ClientRegistry) -> anyhow::Result<()> {
        let _guard = self.persist_lock.lock().await;
        let records = registry.export().await;
        self.save(&records).await
    }

    #[instrument(skip(self, records), fields(repo = "clients", operation = "save", clients = records.len()))]
    pub async fn save(&self, records: &HashMap<String, ClientRecord>) -> anyhow::Result<()> {
        self.file.write(records).await
    }
}
