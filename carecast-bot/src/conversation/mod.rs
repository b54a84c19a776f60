//! The conversation core.
//!
//! - [`extract`] finds the city in a weather request
//! - [`intent`] picks the route for a message
//! - [`replies`] holds the wording
//! - [`Responder`] runs the handlers and the session bookkeeping
//! - [`ConversationLoop`] connects the responder to the message bus

pub mod extract;
pub mod intent;
mod loop_runner;
pub mod replies;
mod responder;

pub use extract::{CityExtractor, PREPOSITIONS, ParsedQuery, PrepositionScan};
pub use intent::{Intent, IntentRouter, IntentRule};
pub use loop_runner::{ConversationLoop, StopHandle};
pub use replies::ReplyTemplates;
pub use responder::{FollowUp, Responder};
