//! Machinery domain module
//!
//! Contains models and service for equipment listings.

mod model;
mod service;

pub use model::*;
pub use service::{MachineryError, MachineryService};
