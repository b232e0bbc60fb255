use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};
use sled::{Db, IVec, Tree};

pub mod branding;
pub mod chat;
pub mod notifications;
pub mod price;
pub mod requests;
pub mod transactions;
pub mod users;

const ACCOUNTS_TREE: &str = "accounts";
const ACCOUNT_EMAILS_TREE: &str = "account_emails";
const REQUEST_OWNERS_TREE: &str = "request_owners";
const SESSION_TREE: &str = "session";
const CHAT_TREE: &str = "chat";
const CONVERSATION_META_TREE: &str = "conversation_meta";
const NOTIFICATIONS_TREE: &str = "notifications";
const RATES_TREE: &str = "rates";
const BRANDING_TREE: &str = "branding";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
    #[error("External service unavailable: {0}")]
    ExternalUnavailable(String),
    #[error("Corrupt value under key {key}: {source}")]
    Corrupt {
        key: String,
        source: serde_json::Error,
    },
    #[error("Could not encode value: {0}")]
    Encode(serde_json::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),
}

/// Handle to every persisted collection. Cloning is cheap; all clones share
/// the same database.
#[derive(Clone)]
pub struct Store {
    db: Db,
    pub accounts: Tree,
    pub account_emails: Tree,
    pub request_owners: Tree,
    pub session: Tree,
    pub chat: Tree,
    pub conversation_meta: Tree,
    pub notifications: Tree,
    pub rates: Tree,
    pub branding: Tree,
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    pub fn from_db(db: Db) -> Result<Self, StoreError> {
        Ok(Self {
            accounts: db.open_tree(ACCOUNTS_TREE)?,
            account_emails: db.open_tree(ACCOUNT_EMAILS_TREE)?,
            request_owners: db.open_tree(REQUEST_OWNERS_TREE)?,
            session: db.open_tree(SESSION_TREE)?,
            chat: db.open_tree(CHAT_TREE)?,
            conversation_meta: db.open_tree(CONVERSATION_META_TREE)?,
            notifications: db.open_tree(NOTIFICATIONS_TREE)?,
            rates: db.open_tree(RATES_TREE)?,
            branding: db.open_tree(BRANDING_TREE)?,
            db,
        })
    }

    /// Monotonic key for append-only logs; big-endian so iteration order is
    /// insertion order.
    pub fn next_log_key(&self) -> Result<[u8; 8], StoreError> {
        Ok(self.db.generate_id()?.to_be_bytes())
    }

    pub async fn flush(&self) -> Result<usize, StoreError> {
        Ok(self.db.flush_async().await?)
    }
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(StoreError::Encode)
}

pub fn decode<T: DeserializeOwned>(key: &[u8], bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes).map_err(|source| StoreError::Corrupt {
        key: String::from_utf8_lossy(key).into_owned(),
        source,
    })
}

/// `Ok(None)` when the key is absent, `Err(Corrupt)` when it holds something
/// that does not decode.
pub fn read<T: DeserializeOwned>(tree: &Tree, key: &str) -> Result<Option<T>, StoreError> {
    match tree.get(key.as_bytes())? {
        Some(bytes) => decode(key.as_bytes(), &bytes).map(Some),
        None => Ok(None),
    }
}

pub fn write<T: Serialize>(tree: &Tree, key: &str, value: &T) -> Result<(), StoreError> {
    tree.insert(key.as_bytes(), encode(value)?)?;
    Ok(())
}

/// Rewrites the value under `key`, starting from the bytes in `current`.
/// `f` returns false to leave the value untouched. A concurrent writer forces
/// a retry on the newer value; a key removed in the meantime stays removed.
/// Returns whether a write happened.
pub fn update_value<T, F>(
    tree: &Tree,
    key: &[u8],
    mut current: IVec,
    mut f: F,
) -> Result<bool, StoreError>
where
    T: Serialize + DeserializeOwned,
    F: FnMut(&mut T) -> bool,
{
    loop {
        let mut value: T = decode(key, &current)?;
        if !f(&mut value) {
            return Ok(false);
        }

        match tree.compare_and_swap(key, Some(&current), Some(encode(&value)?))? {
            Ok(()) => return Ok(true),
            Err(conflict) => match conflict.current {
                Some(latest) => current = latest,
                None => return Ok(false),
            },
        }
    }
}

/// Decodes every value of a log tree, oldest first.
pub fn read_log<T: DeserializeOwned>(tree: &Tree) -> Result<Vec<T>, StoreError> {
    tree.iter()
        .map(|entry| {
            let (key, value) = entry?;
            decode(&key, &value)
        })
        .collect()
}
