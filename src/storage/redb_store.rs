//! On-disk record store backed by redb
//!
//! Both partitions share one database file, one table each. redb transactions
//! are blocking, so every operation runs on the blocking pool and the async
//! caller only suspends on the join.

use super::{Partition, Partitions, RecordStore, StoredRecord};
use crate::error::{StoreError, StoreResult};
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;

// redb table definitions
const DEFINITIONS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("definitions");
const ACTIONS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("actions");

fn table_for(partition: Partition) -> TableDefinition<'static, &'static str, &'static [u8]> {
    match partition {
        Partition::Definitions => DEFINITIONS_TABLE,
        Partition::Actions => ACTIONS_TABLE,
    }
}

/// One partition of a redb database file
pub struct RedbStore {
    db: Arc<Database>,
    partition: Partition,
    name: String,
    max_size_kb: f64,
}

impl RedbStore {
    /// Open (or create) the database file and return both partitions over it
    pub fn open_pair(
        db_file: &Path,
        definitions_max_kb: f64,
        actions_max_kb: f64,
    ) -> StoreResult<Partitions> {
        if let Some(parent) = db_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(db_file).map_err(|e| {
            StoreError::StorageUnavailable(format!("{}: {}", db_file.display(), e))
        })?;
        let db = Arc::new(db);
        tracing::debug!("Opened redb store at {}", db_file.display());

        Ok(Partitions::new(
            Arc::new(Self::with_db(Arc::clone(&db), Partition::Definitions, definitions_max_kb)),
            Arc::new(Self::with_db(db, Partition::Actions, actions_max_kb)),
        ))
    }

    fn with_db(db: Arc<Database>, partition: Partition, max_size_kb: f64) -> Self {
        Self {
            db,
            partition,
            name: format!("redb:{}", partition),
            max_size_kb,
        }
    }

    /// Run a blocking redb operation off the async workers
    async fn blocking<T, F>(&self, op: F) -> Result<T, String>
    where
        F: FnOnce(&Database, TableDefinition<'static, &'static str, &'static [u8]>) -> anyhow::Result<T>
            + Send
            + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let table = table_for(self.partition);
        match tokio::task::spawn_blocking(move || op(&db, table)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(e) => Err(format!("blocking task failed: {e}")),
        }
    }
}

#[async_trait]
impl RecordStore for RedbStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn partition(&self) -> Partition {
        self.partition
    }

    fn is_persistent(&self) -> bool {
        true
    }

    fn max_size_kb(&self) -> f64 {
        self.max_size_kb
    }

    async fn get_all(
        &self,
        prefix: Option<&str>,
        include_expired: bool,
    ) -> StoreResult<IndexMap<String, StoredRecord>> {
        let prefix = prefix.map(str::to_string);
        self.blocking(move |db, table| {
            let read_txn = db.begin_read()?;
            let table = match read_txn.open_table(table) {
                Ok(t) => t,
                Err(redb::TableError::TableDoesNotExist(_)) => return Ok(IndexMap::new()),
                Err(e) => return Err(e.into()),
            };

            let now = Utc::now();
            let mut records = IndexMap::new();
            for item in table.iter()? {
                let (key, value) = item?;
                let key = key.value();
                if prefix.as_deref().is_some_and(|p| !key.starts_with(p)) {
                    continue;
                }
                let record: StoredRecord = serde_json::from_slice(value.value())
                    .with_context(|| format!("corrupt record `{}`", key))?;
                if include_expired || !record.is_expired_at(now) {
                    records.insert(key.to_string(), record);
                }
            }
            Ok(records)
        })
        .await
        .map_err(|reason| StoreError::ReadFailed {
            partition: self.partition,
            reason,
        })
    }

    async fn size_kb(&self) -> StoreResult<f64> {
        self.blocking(|db, table| {
            let read_txn = db.begin_read()?;
            let table = match read_txn.open_table(table) {
                Ok(t) => t,
                Err(redb::TableError::TableDoesNotExist(_)) => return Ok(0.0),
                Err(e) => return Err(e.into()),
            };
            let mut bytes = 0usize;
            for item in table.iter()? {
                let (key, value) = item?;
                bytes += key.value().len() + value.value().len();
            }
            Ok(bytes as f64 / 1024.0)
        })
        .await
        .map_err(|reason| StoreError::SizeQueryFailed {
            partition: self.partition,
            reason,
        })
    }

    async fn put(&self, records: Vec<(String, StoredRecord)>) -> StoreResult<()> {
        let encoded = records
            .iter()
            .map(|(k, r)| Ok((k.clone(), serde_json::to_vec(r)?)))
            .collect::<StoreResult<Vec<(String, Vec<u8>)>>>()?;

        self.blocking(move |db, table| {
            let write_txn = db.begin_write()?;
            {
                let mut table = write_txn.open_table(table)?;
                for (key, value) in &encoded {
                    table.insert(key.as_str(), value.as_slice())?;
                }
            }
            write_txn.commit()?;
            Ok(())
        })
        .await
        .map_err(|reason| StoreError::WriteFailed {
            partition: self.partition,
            reason,
        })
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.remove_many(&[key.to_string()]).await
    }

    /// Removes every key in one transaction
    async fn remove_many(&self, keys: &[String]) -> StoreResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let owned = keys.to_vec();
        self.blocking(move |db, table| {
            let write_txn = db.begin_write()?;
            {
                let mut table = write_txn.open_table(table)?;
                for key in &owned {
                    table.remove(key.as_str())?;
                }
            }
            write_txn.commit()?;
            Ok(())
        })
        .await
        .map_err(|reason| StoreError::RemovalFailed {
            partition: self.partition,
            key: keys.join(", "),
            reason,
        })
    }

    async fn clear(&self) -> StoreResult<()> {
        self.blocking(|db, table| {
            let write_txn = db.begin_write()?;
            write_txn.delete_table(table)?;
            write_txn.commit()?;
            Ok(())
        })
        .await
        .map_err(|reason| StoreError::WriteFailed {
            partition: self.partition,
            reason,
        })
    }
}

// redb::Database handles cleanup on Drop; both partitions hold the same Arc.
