//! Redb-backed DAG service and datastore.
//!
//! Both backends share one `cairn.redb` database file: nodes live in the
//! `blocks` table keyed by their binary [`Cid`], datastore entries in the
//! `datastore` table keyed by string.

use bytes::Bytes;
use cairn_core::{Cid, DagNode, DagService, Datastore, StoreError, StoreResult};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::{path::Path, sync::Arc};

const BLOCKS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("blocks");
const DATASTORE: TableDefinition<&str, &[u8]> = TableDefinition::new("datastore");

/// Handle on the database file, from which both backends are derived.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;
        let db = Database::create(path.join("cairn.redb"))?;

        // Create both tables up front so that a first read on a fresh
        // database doesn't fail with a missing table.
        {
            let write_txn = db.begin_write()?;
            {
                let _ = write_txn.open_table(BLOCKS)?;
                let _ = write_txn.open_table(DATASTORE)?;
            }
            write_txn.commit()?;
        }

        Ok(Self { db: Arc::new(db) })
    }

    pub fn dag(&self) -> RedbDag {
        RedbDag {
            db: self.db.clone(),
        }
    }

    pub fn datastore(&self) -> RedbDatastore {
        RedbDatastore {
            db: self.db.clone(),
        }
    }
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish()
    }
}

fn join_error(what: &str, err: tokio::task::JoinError) -> StoreError {
    StoreError::Other(anyhow::anyhow!("redb {what} task failed: {err}"))
}

/// `DagService` over the `blocks` table.
#[derive(Clone)]
pub struct RedbDag {
    db: Arc<Database>,
}

impl std::fmt::Debug for RedbDag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbDag").finish()
    }
}

#[async_trait::async_trait]
impl DagService for RedbDag {
    async fn get(&self, cid: &Cid) -> StoreResult<DagNode> {
        let db = self.db.clone();
        let cid = *cid;

        let block = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<Vec<u8>>> {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(BLOCKS)?;
            let key = cid.to_bytes();
            Ok(table.get(key.as_slice())?.map(|guard| guard.value().to_vec()))
        })
        .await
        .map_err(|e| join_error("read", e))??;

        let block = block.ok_or_else(|| StoreError::NotFound(cid.to_string()))?;
        Ok(DagNode::decode(&block)?)
    }

    async fn put(&self, node: &DagNode) -> StoreResult<Cid> {
        let db = self.db.clone();
        let encoded = node.encode();
        let cid = Cid::digest(&encoded);

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let write_txn = db.begin_write()?;
            {
                let mut table = write_txn.open_table(BLOCKS)?;
                let key = cid.to_bytes();
                if table.get(key.as_slice())?.is_none() {
                    table.insert(key.as_slice(), &encoded[..])?;
                }
            }
            write_txn.commit()?;
            Ok(())
        })
        .await
        .map_err(|e| join_error("write", e))??;

        Ok(cid)
    }

    async fn has(&self, cid: &Cid) -> StoreResult<bool> {
        let db = self.db.clone();
        let cid = *cid;

        let found = tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(BLOCKS)?;
            let key = cid.to_bytes();
            Ok(table.get(key.as_slice())?.is_some())
        })
        .await
        .map_err(|e| join_error("read", e))??;

        Ok(found)
    }
}

/// `Datastore` over the `datastore` table.
#[derive(Clone)]
pub struct RedbDatastore {
    db: Arc<Database>,
}

impl std::fmt::Debug for RedbDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbDatastore").finish()
    }
}

#[async_trait::async_trait]
impl Datastore for RedbDatastore {
    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        let db = self.db.clone();
        let owned_key = key.to_owned();

        let value = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<Bytes>> {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(DATASTORE)?;
            Ok(table
                .get(owned_key.as_str())?
                .map(|guard| Bytes::copy_from_slice(guard.value())))
        })
        .await
        .map_err(|e| join_error("read", e))??;

        value.ok_or_else(|| StoreError::NotFound(key.to_owned()))
    }

    async fn put(&self, key: &str, value: Bytes) -> StoreResult<()> {
        let db = self.db.clone();
        let key = key.to_owned();

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let write_txn = db.begin_write()?;
            {
                let mut table = write_txn.open_table(DATASTORE)?;
                table.insert(key.as_str(), &value[..])?;
            }
            write_txn.commit()?;
            Ok(())
        })
        .await
        .map_err(|e| join_error("write", e))??;

        Ok(())
    }

    async fn has(&self, key: &str) -> StoreResult<bool> {
        let db = self.db.clone();
        let key = key.to_owned();

        let found = tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(DATASTORE)?;
            Ok(table.get(key.as_str())?.is_some())
        })
        .await
        .map_err(|e| join_error("read", e))??;

        Ok(found)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let db = self.db.clone();
        let key = key.to_owned();

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let write_txn = db.begin_write()?;
            {
                let mut table = write_txn.open_table(DATASTORE)?;
                table.remove(key.as_str())?;
            }
            write_txn.commit()?;
            Ok(())
        })
        .await
        .map_err(|e| join_error("delete", e))??;

        Ok(())
    }
}
