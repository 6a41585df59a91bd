//! # LedgerDb
//!
//! A thin typed layer over sled. Every record type names its own tree and
//! derives its own key; the database doesn't know what a plan or a vault is.
//!
//! ## Tree Layout
//!
//! | Tree       | Key                     | Value              |
//! |------------|-------------------------|--------------------|
//! | `plans`    | plan id (16B BE)        | `bincode(Plan)`    |
//! | `vaults`   | vault address (20B)     | `bincode(Vault)`   |
//! | `metadata` | key (UTF-8)             | value (bytes)      |
//!
//! Integer keys are big-endian so sled's lexicographic order is numeric
//! order, which keeps [`LedgerDb::fingerprint`] independent of insertion
//! order.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::{Batch, Db, Tree};
use std::path::Path;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("key not found: {0}")]
    NotFound(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// A value that lives in its own sled tree.
pub trait Record: Serialize + DeserializeOwned {
    /// Name of the tree holding records of this type.
    const TREE: &'static str;

    /// Key under which this record is stored. Must be stable across runs.
    fn key(&self) -> Vec<u8>;
}

/// Trees whose contents feed the fingerprint, in hashing order.
const FINGERPRINT_TREES: &[&str] = &["plans", "vaults"];

const METADATA_TREE: &str = "metadata";

// ---------------------------------------------------------------------------
// LedgerDb
// ---------------------------------------------------------------------------

/// Persistent store for ledger records.
///
/// Cloning is cheap: sled handles are reference counted and safe to share
/// across threads.
#[derive(Debug, Clone)]
pub struct LedgerDb {
    db: Db,
    metadata: Tree,
}

impl LedgerDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path.as_ref())?;
        tracing::debug!(
            path = %path.as_ref().display(),
            recovered = db.was_recovered(),
            "ledger opened"
        );
        Self::from_db(db)
    }

    /// A database that lives in memory and disappears on drop.
    pub fn open_temporary() -> DbResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let metadata = db.open_tree(METADATA_TREE)?;
        Ok(Self { db, metadata })
    }

    fn tree<R: Record>(&self) -> DbResult<Tree> {
        Ok(self.db.open_tree(R::TREE)?)
    }

    // -- Records ------------------------------------------------------------

    /// Insert or overwrite a single record.
    pub fn put<R: Record>(&self, record: &R) -> DbResult<()> {
        let bytes = encode(record)?;
        self.tree::<R>()?.insert(record.key(), bytes)?;
        Ok(())
    }

    /// Write several records of one type atomically.
    pub fn put_all<'a, R, I>(&self, records: I) -> DbResult<()>
    where
        R: Record + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        let mut batch = Batch::default();
        for record in records {
            batch.insert(record.key(), encode(record)?);
        }
        self.tree::<R>()?.apply_batch(batch)?;
        Ok(())
    }

    /// Fetch a record by key. `None` if it was never written.
    pub fn get<R: Record>(&self, key: &[u8]) -> DbResult<Option<R>> {
        match self.tree::<R>()?.get(key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Like [`get`](Self::get) but a missing key is an error.
    pub fn require<R: Record>(&self, key: &[u8]) -> DbResult<R> {
        self.get(key)?
            .ok_or_else(|| DbError::NotFound(format!("{}/{}", R::TREE, hex::encode(key))))
    }

    /// Every record of one type, in key order.
    pub fn load_all<R: Record>(&self) -> DbResult<Vec<R>> {
        let mut out = Vec::new();
        for entry in self.tree::<R>()?.iter() {
            let (_key, value) = entry?;
            out.push(decode(&value)?);
        }
        Ok(out)
    }

    pub fn count<R: Record>(&self) -> DbResult<usize> {
        Ok(self.tree::<R>()?.len())
    }

    // -- Metadata -----------------------------------------------------------

    pub fn set_meta(&self, key: &str, value: &[u8]) -> DbResult<()> {
        self.metadata.insert(key.as_bytes(), value)?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> DbResult<Option<Vec<u8>>> {
        Ok(self.metadata.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    // -- Utility ------------------------------------------------------------

    /// BLAKE3 over every `(tree, key, value)` of the ledger trees, in key
    /// order. Two stores holding the same records produce the same
    /// fingerprint; an empty store hashes to all zeros.
    pub fn fingerprint(&self) -> DbResult<[u8; 32]> {
        let mut hasher = blake3::Hasher::new();
        let mut seen = false;
        for name in FINGERPRINT_TREES {
            let tree = self.db.open_tree(name)?;
            for entry in tree.iter() {
                let (key, value) = entry?;
                hasher.update(name.as_bytes());
                hasher.update(&(key.len() as u64).to_be_bytes());
                hasher.update(&key);
                hasher.update(&(value.len() as u64).to_be_bytes());
                hasher.update(&value);
                seen = true;
            }
        }
        if !seen {
            return Ok([0u8; 32]);
        }
        Ok(*hasher.finalize().as_bytes())
    }

    /// Block until every pending write is durable.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn encode<R: Serialize>(record: &R) -> DbResult<Vec<u8>> {
    bincode::serialize(record).map_err(|e| DbError::Serialization(e.to_string()))
}

fn decode<R: DeserializeOwned>(bytes: &[u8]) -> DbResult<R> {
    bincode::deserialize(bytes).map_err(|e| DbError::Serialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
