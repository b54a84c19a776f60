//! Per-user conversation state.
//!
//! A session only remembers the last city a user asked about; the follow-up
//! handler reads it back when the user answers the yes/no prompt.

mod store;

pub use store::{MemorySessionStore, Session, SessionStore};
