//! Chat domain module
//!
//! Direct messages between renters and owners; conversations are derived
//! from the message table, not stored.

mod model;
mod service;

pub use model::*;
pub use service::{ChatError, ChatService};
