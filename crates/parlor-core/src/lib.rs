//! Domain types and the server-side Sans-IO session state machine shared by
//! `parlor-store`, `parlor-client`, and `parlor-server`.
//!
//! The client-side session lives in `parlor-client` instead: it is the more
//! bespoke half (it owns the event queue and the request multiplexer), while
//! the pieces every crate needs, `Relation`/`Message`/`User` and the
//! server's authenticate/dispatch/quit state machine, live here.

mod domain;
mod error;
mod server_session;

pub use domain::{Message, Relation, User, hash_token};
pub use error::SessionError;
pub use server_session::{
    DispatchRequest, DispatchResult, ServerAction, ServerSession, ServerSessionConfig,
};
