//! Review domain module
//!
//! Contains models and service for post-rental reviews.

mod model;
mod service;

pub use model::*;
pub use service::{ReviewError, ReviewService};
