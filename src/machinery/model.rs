//! Machinery models and data structures

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// Equipment categories offered on the marketplace
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "machinery_type", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum MachineryType {
    Tractor,
    Harvester,
    Tiller,
    Sprayer,
    Other,
}

/// Machinery listing model
///
/// `available` is a coarse global flag set by the owner; the actual rental
/// calendar is derived from the booking table.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Machinery {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub machinery_type: MachineryType,
    pub description: Option<String>,
    pub hourly_rate: Option<f64>,
    pub daily_rate: f64,
    pub location: String,
    pub photos: Vec<String>,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request DTO for creating a listing
#[derive(Debug, Deserialize, Validate)]
pub struct CreateMachineryRequest {
    #[validate(length(min = 3, message = "Name must be at least 3 characters"))]
    pub name: String,
    pub machinery_type: MachineryType,
    pub description: Option<String>,
    #[validate(range(min = 0.0, message = "Hourly rate must be positive"))]
    pub hourly_rate: Option<f64>,
    #[validate(range(min = 0.0, message = "Daily rate must be positive"))]
    pub daily_rate: f64,
    #[validate(length(min = 3, message = "Location is required"))]
    pub location: String,
    #[validate(length(min = 1, message = "At least one photo is required"))]
    pub photos: Vec<String>,
    pub available: Option<bool>,
}

/// Request DTO for updating a listing; absent fields are left unchanged
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMachineryRequest {
    #[validate(length(min = 3, message = "Name must be at least 3 characters"))]
    pub name: Option<String>,
    pub machinery_type: Option<MachineryType>,
    pub description: Option<String>,
    pub hourly_rate: Option<f64>,
    #[validate(range(min = 0.0, message = "Daily rate must be positive"))]
    pub daily_rate: Option<f64>,
    #[validate(length(min = 3, message = "Location is required"))]
    pub location: Option<String>,
    pub photos: Option<Vec<String>>,
    pub available: Option<bool>,
}

/// Query parameters for browsing listings
#[derive(Debug, Default, Deserialize)]
pub struct ListMachineryQuery {
    /// When set, returns every listing of that owner (including
    /// unavailable ones, for the owner dashboard)
    pub owner_id: Option<Uuid>,
    pub machinery_type: Option<MachineryType>,
    pub location: Option<String>,
}

/// Listing with owner name/location attached (browse view)
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct MachineryWithOwner {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub machinery_type: MachineryType,
    pub description: Option<String>,
    pub hourly_rate: Option<f64>,
    pub daily_rate: f64,
    pub location: String,
    pub photos: Vec<String>,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub owner_name: String,
    pub owner_location: Option<String>,
}

/// Listing detail view with review aggregate
#[derive(Debug, Serialize)]
pub struct MachineryDetails {
    #[serde(flatten)]
    pub machinery: Machinery,
    pub owner: crate::models::UserSummary,
    pub average_rating: Option<f64>,
    pub reviews_count: i64,
}
