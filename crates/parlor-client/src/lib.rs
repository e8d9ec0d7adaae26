//! Client-side session driver for the parlor chat system (§4.4/§4.5).
//!
//! [`session::ClientSession`] owns the socket, authenticates, and translates
//! [`event::InputEvent`]s to request packets via
//! [`multiplexer::send_and_wait_for_response`]. [`queue::EventQueue`] is the
//! multi-producer/single-consumer channel that lets many event producers
//! (e.g. an HTTP handler per request) share that one session from separate
//! threads (§5).

mod error;
mod event;
mod multiplexer;
mod queue;
mod session;

pub use error::ClientError;
pub use event::{InputEvent, OutputEvent};
pub use multiplexer::{PendingResponses, send_and_wait_for_response};
pub use queue::{EventQueue, EventQueueHandle, EventReply};
pub use session::{ClientSession, ClientSessionConfig, random_id};
