//! Data models shared across the AgriRent backend

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod auth;
pub use auth::*;

/// User model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User roles: owners list machinery, renters book it
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Owner,
    Renter,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Owner => "OWNER",
            UserRole::Renter => "RENTER",
        }
    }
}

/// User response (sanitized for API)
#[derive(Debug, Serialize, Clone)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            phone: user.phone,
            location: user.location,
            bio: user.bio,
            created_at: user.created_at,
        }
    }
}

/// Public profile of a chat counterpart or listing owner
#[derive(Debug, Serialize, sqlx::FromRow, Clone)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub role: UserRole,
    pub location: Option<String>,
}

/// Dashboard statistics for a user
#[derive(Debug, Serialize)]
pub struct UserStats {
    pub machinery_count: i64,
    pub bookings_count: i64,
    pub total_earnings: f64,
    pub average_rating: f64,
    pub reviews_count: i64,
}
