//! Booking domain module
//!
//! Contains models, pricing, and the admission/lifecycle service for
//! machinery rentals.

mod model;
mod pricing;
mod service;

pub use model::*;
pub use pricing::{compute_price, rental_hours};
pub use service::{BookingError, BookingService};
