//! An in-memory [`Store`] for tests and simulation.
//!
//! Mirrors `redb`'s durability guarantees with none of the I/O: a single
//! mutex-guarded set of maps, cloned cheaply via `Arc`. Grounded on the
//! reference in-memory storage backend's `Arc<Mutex<Inner>>` shape.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{SystemTime, UNIX_EPOCH},
};

use parlor_core::{Message, Relation, hash_token};

use crate::{
    error::StoreError,
    store::{AccountPolicy, AddUserOutcome, Store},
};

#[derive(Debug, Default)]
struct Inner {
    /// username -> token hash
    users: HashMap<String, [u8; 64]>,
    /// token hash -> username, the inverse index `check_token` needs.
    tokens: HashMap<[u8; 64], String>,
    /// keyed by (first_username, secondary_username)
    relations: HashMap<(String, String), Relation>,
    messages: Vec<Message>,
}

/// In-memory [`Store`] implementation. Cheap to clone; all instances created
/// from the same [`MemoryStore::new`] call share state.
#[derive(Clone)]
pub struct MemoryStore {
    policy: AccountPolicy,
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Create an empty store governed by `policy`.
    #[must_use]
    pub fn new(policy: AccountPolicy) -> Self {
        Self { policy, inner: Arc::new(Mutex::new(Inner::default())) }
    }

    fn generate_token(&self) -> Result<String, StoreError> {
        let charset = &self.policy.token_charset;
        if charset.is_empty() {
            return Err(StoreError::Backend("token charset is empty".into()));
        }
        let mut raw = vec![0u8; self.policy.token_length];
        getrandom::fill(&mut raw).map_err(|e| StoreError::Backend(e.to_string()))?;
        let token: String = raw
            .into_iter()
            .map(|byte| charset[byte as usize % charset.len()] as char)
            .collect();
        Ok(token)
    }

    fn upsert_relation_bit(
        inner: &mut Inner,
        first: &str,
        secondary: &str,
        set_first_is_friend: Option<bool>,
        set_secondary_is_friend: Option<bool>,
    ) {
        let key = (first.to_string(), secondary.to_string());
        let row = inner.relations.entry(key).or_insert_with(|| Relation {
            first_username: first.to_string(),
            secondary_username: secondary.to_string(),
            first_is_friend: false,
            secondary_is_friend: false,
            secondary_is_blocked: false,
        });
        if let Some(value) = set_first_is_friend {
            row.first_is_friend = value;
        }
        if let Some(value) = set_secondary_is_friend {
            row.secondary_is_friend = value;
        }
    }
}

fn now_unix_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

impl Store for MemoryStore {
    fn ensure_tables(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned by a prior panicking holder.
    fn add_user(&self, username: &str) -> Result<AddUserOutcome, StoreError> {
        if username.len() < self.policy.min_username_length {
            return Ok(AddUserOutcome::TooShort);
        }
        if username.len() > self.policy.max_username_length {
            return Ok(AddUserOutcome::TooLong);
        }
        let token = self.generate_token()?;
        let token_hash = hash_token(&token);
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        inner.users.insert(username.to_string(), token_hash);
        inner.tokens.insert(token_hash, username.to_string());
        Ok(AddUserOutcome::Created { token })
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned by a prior panicking holder.
    fn check_token(&self, token: &str) -> Result<Option<String>, StoreError> {
        let hash = hash_token(token);
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner.tokens.get(&hash).cloned())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned by a prior panicking holder.
    fn check_user_exists(&self, username: &str) -> Result<bool, StoreError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner.users.contains_key(username))
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned by a prior panicking holder.
    fn get_all_relations(&self, user: &str) -> Result<Vec<Relation>, StoreError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner
            .relations
            .values()
            .filter(|relation| relation.first_username == user)
            .cloned()
            .collect())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned by a prior panicking holder.
    fn get_relation(&self, first: &str, secondary: &str) -> Result<Option<Relation>, StoreError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner.relations.get(&(first.to_string(), secondary.to_string())).cloned())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned by a prior panicking holder.
    fn add_friend(&self, a: &str, b: &str) -> Result<bool, StoreError> {
        if a == b {
            return Ok(false);
        }
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        if !inner.users.contains_key(b) {
            return Ok(false);
        }
        Self::upsert_relation_bit(&mut inner, a, b, Some(true), None);
        Self::upsert_relation_bit(&mut inner, b, a, None, Some(true));
        Ok(true)
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned by a prior panicking holder.
    fn remove_friend(&self, a: &str, b: &str) -> Result<bool, StoreError> {
        if a == b {
            return Ok(false);
        }
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        if !inner.users.contains_key(b) {
            return Ok(false);
        }
        Self::upsert_relation_bit(&mut inner, a, b, Some(false), None);
        Self::upsert_relation_bit(&mut inner, b, a, None, Some(false));
        Ok(true)
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned by a prior panicking holder.
    fn add_message(&self, sender: &str, receiver: &str, content: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        inner.messages.push(Message {
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            time_sent: now_unix_seconds(),
            content: content.to_string(),
        });
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned by a prior panicking holder.
    fn get_messages(
        &self,
        a: &str,
        b: &str,
        time_back_seconds: u64,
    ) -> Result<Vec<Message>, StoreError> {
        let threshold = now_unix_seconds().saturating_sub(time_back_seconds);
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner
            .messages
            .iter()
            .filter(|message| {
                let parties_match = (message.sender == a && message.receiver == b)
                    || (message.sender == b && message.receiver == a);
                parties_match && message.time_sent >= threshold
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::new(AccountPolicy::default())
    }

    #[test]
    fn add_user_rejects_too_short_and_too_long() {
        let store = store();
        assert_eq!(store.add_user("").unwrap(), AddUserOutcome::TooShort);
        let too_long = "x".repeat(AccountPolicy::default().max_username_length + 1);
        assert_eq!(store.add_user(&too_long).unwrap(), AddUserOutcome::TooLong);
    }

    #[test]
    fn add_user_then_check_token_round_trips() {
        let store = store();
        let AddUserOutcome::Created { token } = store.add_user("alice").unwrap() else {
            panic!("expected account creation");
        };
        assert_eq!(store.check_token(&token).unwrap(), Some("alice".to_string()));
        assert_eq!(store.check_token("not-a-real-token").unwrap(), None);
        assert!(store.check_user_exists("alice").unwrap());
        assert!(!store.check_user_exists("bob").unwrap());
    }

    #[test]
    fn add_friend_requires_target_to_exist_and_rejects_self() {
        let store = store();
        store.add_user("alice").unwrap();
        assert!(!store.add_friend("alice", "alice").unwrap());
        assert!(!store.add_friend("alice", "ghost").unwrap());
    }

    #[test]
    fn add_friend_writes_symmetric_mirror_rows() {
        let store = store();
        store.add_user("alice").unwrap();
        store.add_user("bob").unwrap();
        assert!(store.add_friend("alice", "bob").unwrap());

        let a_view = store.get_relation("alice", "bob").unwrap().unwrap();
        assert!(a_view.first_is_friend);
        assert!(!a_view.secondary_is_friend);

        let b_view = store.get_relation("bob", "alice").unwrap().unwrap();
        assert!(!b_view.first_is_friend);
        assert!(b_view.secondary_is_friend);

        assert!(store.add_friend("bob", "alice").unwrap());
        let a_view = store.get_relation("alice", "bob").unwrap().unwrap();
        assert!(a_view.first_is_friend);
        assert!(a_view.secondary_is_friend);
    }

    #[test]
    fn remove_friend_clears_the_mirrored_bit() {
        let store = store();
        store.add_user("alice").unwrap();
        store.add_user("bob").unwrap();
        store.add_friend("alice", "bob").unwrap();
        assert!(store.remove_friend("alice", "bob").unwrap());
        let a_view = store.get_relation("alice", "bob").unwrap().unwrap();
        assert!(!a_view.first_is_friend);
        let b_view = store.get_relation("bob", "alice").unwrap().unwrap();
        assert!(!b_view.secondary_is_friend);
    }

    #[test]
    fn get_all_relations_only_returns_rows_owned_by_the_caller() {
        let store = store();
        store.add_user("alice").unwrap();
        store.add_user("bob").unwrap();
        store.add_user("carol").unwrap();
        store.add_friend("alice", "bob").unwrap();
        store.add_friend("alice", "carol").unwrap();

        let rows = store.get_all_relations("alice").unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.first_username == "alice"));
    }

    #[test]
    fn get_messages_filters_by_party_pair_and_recency() {
        let store = store();
        store.add_message("alice", "bob", "hi").unwrap();
        store.add_message("carol", "dave", "unrelated").unwrap();

        let messages = store.get_messages("alice", "bob", u64::MAX).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "hi");

        // direction is irrelevant: (bob, alice) matches the same pair.
        let messages = store.get_messages("bob", "alice", u64::MAX).unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn get_messages_with_zero_lookback_is_literally_empty() {
        let store = store();
        store.add_message("alice", "bob", "hi").unwrap();
        let messages = store.get_messages("alice", "bob", 0).unwrap();
        assert!(messages.is_empty());
    }
}
