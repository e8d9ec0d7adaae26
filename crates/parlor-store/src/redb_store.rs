//! Durable storage backed by `redb` (§6.3).
//!
//! Three tables, matching the schema §6 names verbatim: `users`, `messages`,
//! `relations`. Uses `redb`'s ACID transactions for crash safety; CBOR
//! (`ciborium`) encodes row values the same way the reference persistence
//! layer encodes its CBOR-valued tables.

use std::{path::Path, sync::Arc};

use parlor_core::{Message, Relation, hash_token};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::{
    error::StoreError,
    store::{AccountPolicy, AddUserOutcome, Store},
};

/// Table: users
/// Key: username
/// Value: CBOR-encoded [`StoredUser`]
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Table: messages
/// Key: auto-incrementing sequence number, big-endian
/// Value: CBOR-encoded [`StoredMessage`]
const MESSAGES: TableDefinition<u64, &[u8]> = TableDefinition::new("messages");

/// Table: relations
/// Key: `first_username\x00secondary_username`
/// Value: CBOR-encoded [`Relation`]-shaped row
const RELATIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("relations");

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredUser {
    token_hash: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredMessage {
    sender: String,
    receiver: String,
    time_sent: u64,
    content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRelation {
    first_username: String,
    secondary_username: String,
    first_is_friend: bool,
    secondary_is_friend: bool,
    secondary_is_blocked: bool,
}

impl From<StoredRelation> for Relation {
    fn from(row: StoredRelation) -> Self {
        Self {
            first_username: row.first_username,
            secondary_username: row.secondary_username,
            first_is_friend: row.first_is_friend,
            secondary_is_friend: row.secondary_is_friend,
            secondary_is_blocked: row.secondary_is_blocked,
        }
    }
}

fn relation_key(first: &str, secondary: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(first.len() + secondary.len() + 1);
    key.extend_from_slice(first.as_bytes());
    key.push(0);
    key.extend_from_slice(secondary.as_bytes());
    key
}

fn to_backend_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Durable [`Store`] implementation backed by an embedded `redb` database
/// file. Thread-safe through `redb`'s own locking; cloning is a cheap `Arc`
/// bump.
#[derive(Clone)]
pub struct RedbStore {
    policy: AccountPolicy,
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create a database at `path`, governed by `policy`. Call
    /// [`Store::ensure_tables`] before first use.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>, policy: AccountPolicy) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref()).map_err(to_backend_err)?;
        Ok(Self { policy, db: Arc::new(db) })
    }

    fn next_message_sequence<T: ReadableTable<u64, &'static [u8]>>(
        table: &T,
    ) -> Result<u64, StoreError> {
        Ok(table.last().map_err(to_backend_err)?.map_or(0, |(key, _)| key.value() + 1))
    }

    fn generate_token(&self) -> Result<String, StoreError> {
        let charset = &self.policy.token_charset;
        if charset.is_empty() {
            return Err(StoreError::Backend("token charset is empty".into()));
        }
        let mut raw = vec![0u8; self.policy.token_length];
        getrandom::fill(&mut raw).map_err(to_backend_err)?;
        Ok(raw.into_iter().map(|byte| charset[byte as usize % charset.len()] as char).collect())
    }
}

fn now_unix_seconds() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

impl Store for RedbStore {
    fn ensure_tables(&self) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(to_backend_err)?;
        {
            let _ = txn.open_table(USERS).map_err(to_backend_err)?;
            let _ = txn.open_table(MESSAGES).map_err(to_backend_err)?;
            let _ = txn.open_table(RELATIONS).map_err(to_backend_err)?;
        }
        txn.commit().map_err(to_backend_err)
    }

    fn add_user(&self, username: &str) -> Result<AddUserOutcome, StoreError> {
        if username.len() < self.policy.min_username_length {
            return Ok(AddUserOutcome::TooShort);
        }
        if username.len() > self.policy.max_username_length {
            return Ok(AddUserOutcome::TooLong);
        }
        let token = self.generate_token()?;
        let token_hash = hash_token(&token);

        let txn = self.db.begin_write().map_err(to_backend_err)?;
        {
            let mut table = txn.open_table(USERS).map_err(to_backend_err)?;
            let mut bytes = Vec::new();
            ciborium::into_writer(&StoredUser { token_hash: token_hash.to_vec() }, &mut bytes)
                .map_err(to_backend_err)?;
            table.insert(username, bytes.as_slice()).map_err(to_backend_err)?;
        }
        txn.commit().map_err(to_backend_err)?;
        Ok(AddUserOutcome::Created { token })
    }

    fn check_token(&self, token: &str) -> Result<Option<String>, StoreError> {
        let hash = hash_token(token);
        let txn = self.db.begin_read().map_err(to_backend_err)?;
        let table = txn.open_table(USERS).map_err(to_backend_err)?;
        for result in table.iter().map_err(to_backend_err)? {
            let (key, value) = result.map_err(to_backend_err)?;
            let stored: StoredUser = ciborium::from_reader(value.value()).map_err(to_backend_err)?;
            if stored.token_hash == hash {
                return Ok(Some(key.value().to_string()));
            }
        }
        Ok(None)
    }

    fn check_user_exists(&self, username: &str) -> Result<bool, StoreError> {
        let txn = self.db.begin_read().map_err(to_backend_err)?;
        let table = txn.open_table(USERS).map_err(to_backend_err)?;
        Ok(table.get(username).map_err(to_backend_err)?.is_some())
    }

    fn get_all_relations(&self, user: &str) -> Result<Vec<Relation>, StoreError> {
        let txn = self.db.begin_read().map_err(to_backend_err)?;
        let table = txn.open_table(RELATIONS).map_err(to_backend_err)?;
        let prefix_start = relation_key(user, "");
        let mut prefix_end = relation_key(user, "");
        prefix_end.push(0xFF);

        let mut rows = Vec::new();
        for result in
            table.range(prefix_start.as_slice()..=prefix_end.as_slice()).map_err(to_backend_err)?
        {
            let (_, value) = result.map_err(to_backend_err)?;
            let row: StoredRelation = ciborium::from_reader(value.value()).map_err(to_backend_err)?;
            if row.first_username == user {
                rows.push(row.into());
            }
        }
        Ok(rows)
    }

    fn get_relation(&self, first: &str, secondary: &str) -> Result<Option<Relation>, StoreError> {
        let txn = self.db.begin_read().map_err(to_backend_err)?;
        let table = txn.open_table(RELATIONS).map_err(to_backend_err)?;
        let key = relation_key(first, secondary);
        match table.get(key.as_slice()).map_err(to_backend_err)? {
            Some(value) => {
                let row: StoredRelation =
                    ciborium::from_reader(value.value()).map_err(to_backend_err)?;
                Ok(Some(row.into()))
            },
            None => Ok(None),
        }
    }

    fn add_friend(&self, a: &str, b: &str) -> Result<bool, StoreError> {
        if a == b {
            return Ok(false);
        }
        if !self.check_user_exists(b)? {
            return Ok(false);
        }
        self.upsert_relation_bits(a, b, Some(true), None)?;
        self.upsert_relation_bits(b, a, None, Some(true))?;
        Ok(true)
    }

    fn remove_friend(&self, a: &str, b: &str) -> Result<bool, StoreError> {
        if a == b {
            return Ok(false);
        }
        if !self.check_user_exists(b)? {
            return Ok(false);
        }
        self.upsert_relation_bits(a, b, Some(false), None)?;
        self.upsert_relation_bits(b, a, None, Some(false))?;
        Ok(true)
    }

    fn add_message(&self, sender: &str, receiver: &str, content: &str) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(to_backend_err)?;
        {
            let mut table = txn.open_table(MESSAGES).map_err(to_backend_err)?;
            let sequence = Self::next_message_sequence(&table)?;
            let mut bytes = Vec::new();
            ciborium::into_writer(
                &StoredMessage {
                    sender: sender.to_string(),
                    receiver: receiver.to_string(),
                    time_sent: now_unix_seconds(),
                    content: content.to_string(),
                },
                &mut bytes,
            )
            .map_err(to_backend_err)?;
            table.insert(sequence, bytes.as_slice()).map_err(to_backend_err)?;
        }
        txn.commit().map_err(to_backend_err)
    }

    fn get_messages(
        &self,
        a: &str,
        b: &str,
        time_back_seconds: u64,
    ) -> Result<Vec<Message>, StoreError> {
        let threshold = now_unix_seconds().saturating_sub(time_back_seconds);
        let txn = self.db.begin_read().map_err(to_backend_err)?;
        let table = txn.open_table(MESSAGES).map_err(to_backend_err)?;

        let mut messages = Vec::new();
        for result in table.iter().map_err(to_backend_err)? {
            let (_, value) = result.map_err(to_backend_err)?;
            let stored: StoredMessage =
                ciborium::from_reader(value.value()).map_err(to_backend_err)?;
            let parties_match = (stored.sender == a && stored.receiver == b)
                || (stored.sender == b && stored.receiver == a);
            if parties_match && stored.time_sent >= threshold {
                messages.push(Message {
                    sender: stored.sender,
                    receiver: stored.receiver,
                    time_sent: stored.time_sent,
                    content: stored.content,
                });
            }
        }
        Ok(messages)
    }
}

impl RedbStore {
    /// Upsert the `(first, secondary)` relation row, setting whichever of
    /// `first_is_friend`/`secondary_is_friend` is `Some`. Mirrors
    /// [`crate::memory::MemoryStore`]'s two-option update so a caller can set
    /// just one side of the pair without clobbering the other.
    fn upsert_relation_bits(
        &self,
        first: &str,
        secondary: &str,
        set_first_is_friend: Option<bool>,
        set_secondary_is_friend: Option<bool>,
    ) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(to_backend_err)?;
        {
            let mut table = txn.open_table(RELATIONS).map_err(to_backend_err)?;
            let key = relation_key(first, secondary);
            let mut row = match table.get(key.as_slice()).map_err(to_backend_err)? {
                Some(existing) => {
                    ciborium::from_reader::<StoredRelation, _>(existing.value())
                        .map_err(to_backend_err)?
                },
                None => StoredRelation {
                    first_username: first.to_string(),
                    secondary_username: secondary.to_string(),
                    first_is_friend: false,
                    secondary_is_friend: false,
                    secondary_is_blocked: false,
                },
            };
            if let Some(value) = set_first_is_friend {
                row.first_is_friend = value;
            }
            if let Some(value) = set_secondary_is_friend {
                row.secondary_is_friend = value;
            }
            let mut bytes = Vec::new();
            ciborium::into_writer(&row, &mut bytes).map_err(to_backend_err)?;
            table.insert(key.as_slice(), bytes.as_slice()).map_err(to_backend_err)?;
        }
        txn.commit().map_err(to_backend_err)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, RedbStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RedbStore::open(dir.path().join("parlor.redb"), AccountPolicy::default())
            .expect("open");
        store.ensure_tables().expect("ensure_tables");
        (dir, store)
    }

    #[test]
    fn add_user_then_check_token_round_trips() {
        let (_dir, store) = store();
        let AddUserOutcome::Created { token } = store.add_user("alice").unwrap() else {
            panic!("expected account creation");
        };
        assert_eq!(store.check_token(&token).unwrap(), Some("alice".to_string()));
        assert!(store.check_user_exists("alice").unwrap());
    }

    #[test]
    fn add_friend_persists_symmetric_mirror_rows() {
        let (_dir, store) = store();
        store.add_user("alice").unwrap();
        store.add_user("bob").unwrap();
        assert!(store.add_friend("alice", "bob").unwrap());

        let a_view = store.get_relation("alice", "bob").unwrap().unwrap();
        assert!(a_view.first_is_friend);
        let b_view = store.get_relation("bob", "alice").unwrap().unwrap();
        assert!(b_view.secondary_is_friend);
    }

    #[test]
    fn messages_survive_a_reopen_of_the_same_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("parlor.redb");
        {
            let store = RedbStore::open(&path, AccountPolicy::default()).unwrap();
            store.ensure_tables().unwrap();
            store.add_message("alice", "bob", "hi").unwrap();
        }
        let reopened = RedbStore::open(&path, AccountPolicy::default()).unwrap();
        let messages = reopened.get_messages("alice", "bob", u64::MAX).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "hi");
    }
}
