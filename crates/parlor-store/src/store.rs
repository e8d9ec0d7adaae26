//! The storage seam (§4.6): everything a server session dispatches against.
//!
//! Kept out of `parlor-core` so that crate depends only downward
//! (`parlor-store` → `parlor-core` for domain types, `parlor-server` → both).
//! `ServerSession` never sees a [`Store`] at all; it only emits
//! `ServerAction::Dispatch` descriptions for the connection driver to execute
//! against one of these.

use parlor_core::{Message, Relation};

use crate::error::StoreError;

/// Username and token length/charset policy, loaded from
/// `server_config.yml`'s `database` table.
#[derive(Debug, Clone)]
pub struct AccountPolicy {
    /// Inclusive lower bound on username length, in bytes.
    pub min_username_length: usize,
    /// Inclusive upper bound on username length, in bytes.
    pub max_username_length: usize,
    /// Number of characters drawn from `token_charset` per issued token.
    pub token_length: usize,
    /// Alphabet tokens are drawn from, uniformly at random.
    pub token_charset: Vec<u8>,
}

impl Default for AccountPolicy {
    fn default() -> Self {
        Self {
            min_username_length: 3,
            max_username_length: 32,
            token_length: 32,
            token_charset: (b'a'..=b'z').chain(b'0'..=b'9').collect(),
        }
    }
}

/// Outcome of [`Store::add_user`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddUserOutcome {
    /// Account created. The plaintext token is returned exactly once; only
    /// its digest is persisted.
    Created {
        /// The newly issued plaintext token.
        token: String,
    },
    /// `len(username) < min_username_length`.
    TooShort,
    /// `len(username) > max_username_length`.
    TooLong,
}

/// Storage for accounts, friendships, and messages (§4.6).
///
/// Implementations MUST be cheap to clone (an `Arc` handle, as with
/// `MemoryStore` and `RedbStore`) so that one value can be shared across the
/// per-connection threads the server spawns. Methods are synchronous; the
/// server calls them from the connection thread between I/O suspension
/// points, never from inside `ServerSession` itself.
pub trait Store: Clone + Send + Sync + 'static {
    /// Idempotent schema creation. Safe to call on every process start.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the underlying database cannot be
    /// opened or migrated.
    fn ensure_tables(&self) -> Result<(), StoreError>;

    /// Register a new account and issue a token for it.
    ///
    /// `username` length is validated against the configured policy before
    /// anything is written; only `SHA-512(token)` is ever persisted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on a storage failure. Username length
    /// violations are reported through the `Ok` variant, not as errors,
    /// matching the wire protocol's `too_short`/`too_long` result codes.
    fn add_user(&self, username: &str) -> Result<AddUserOutcome, StoreError>;

    /// Resolve a presented token to the username that owns it, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on a storage failure.
    fn check_token(&self, token: &str) -> Result<Option<String>, StoreError>;

    /// Whether an account with this username has been registered.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on a storage failure.
    fn check_user_exists(&self, username: &str) -> Result<bool, StoreError>;

    /// Every relation row whose `first_username == user`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on a storage failure.
    fn get_all_relations(&self, user: &str) -> Result<Vec<Relation>, StoreError>;

    /// The single row for the ordered pair `(first, secondary)`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on a storage failure.
    fn get_relation(&self, first: &str, secondary: &str) -> Result<Option<Relation>, StoreError>;

    /// Mark `a` as a friend of `b`, upserting both mirror rows. Fails (with
    /// `Ok(false)`) if `a == b` or `b` is not a registered account; leaves
    /// existing booleans on the rows untouched apart from the friendship bit.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on a storage failure.
    fn add_friend(&self, a: &str, b: &str) -> Result<bool, StoreError>;

    /// Clear the friendship bit on both mirror rows. Same preconditions as
    /// [`Store::add_friend`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on a storage failure.
    fn remove_friend(&self, a: &str, b: &str) -> Result<bool, StoreError>;

    /// Append an immutable message, stamped with the current wall-clock
    /// time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on a storage failure.
    fn add_message(&self, sender: &str, receiver: &str, content: &str) -> Result<(), StoreError>;

    /// Messages between `a` and `b` sent within the last `time_back_seconds`
    /// seconds, in either direction, oldest first.
    ///
    /// A `time_back_seconds` of `0` is interpreted literally here: "messages
    /// since right now," i.e. none, matching §9's decision that "unbounded
    /// past" is a session-layer concern, not a store one. Callers that want
    /// the full history pass `u64::MAX`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on a storage failure.
    fn get_messages(
        &self,
        a: &str,
        b: &str,
        time_back_seconds: u64,
    ) -> Result<Vec<Message>, StoreError>;
}
