//! Route definitions for the AgriRent API

mod auth;
mod booking;
mod chat;
mod machinery;
mod review;
mod user;

pub use auth::auth_routes;
pub use booking::booking_routes;
pub use chat::chat_routes;
pub use machinery::machinery_routes;
pub use review::review_routes;
pub use user::user_routes;
