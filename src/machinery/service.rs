//! Machinery service layer - Business logic for equipment listings

use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{UserRole, UserSummary};
use crate::retry::{with_retry, RetryError, RetryPolicy};

use super::{
    CreateMachineryRequest, ListMachineryQuery, Machinery, MachineryDetails, MachineryWithOwner,
    UpdateMachineryRequest,
};

/// Machinery service errors
#[derive(Error, Debug)]
pub enum MachineryError {
    #[error("Machinery not found")]
    NotFound,

    #[error("Only owners can list machinery")]
    NotAnOwner,

    #[error("Only the listing owner may modify it")]
    NotListingOwner,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Database connection failed after {attempts} attempts")]
    ConnectionFailed { attempts: u32 },
}

impl From<sqlx::Error> for MachineryError {
    fn from(e: sqlx::Error) -> Self {
        MachineryError::DatabaseError(e.to_string())
    }
}

impl From<RetryError<sqlx::Error>> for MachineryError {
    fn from(e: RetryError<sqlx::Error>) -> Self {
        match e {
            RetryError::ConnectionExhausted { attempts, .. } => {
                MachineryError::ConnectionFailed { attempts }
            }
            RetryError::Operation(inner) => inner.into(),
        }
    }
}

impl From<MachineryError> for ApiError {
    fn from(e: MachineryError) -> Self {
        match e {
            MachineryError::NotFound => ApiError::NotFound(e.to_string()),
            MachineryError::NotAnOwner | MachineryError::NotListingOwner => {
                ApiError::Forbidden(e.to_string())
            }
            MachineryError::ConnectionFailed { attempts } => {
                ApiError::DatabaseUnavailable { attempts }
            }
            MachineryError::DatabaseError(d) => ApiError::DatabaseError(d),
        }
    }
}

/// Machinery service for managing equipment listings
#[derive(Clone)]
pub struct MachineryService {
    db_pool: PgPool,
    retry_policy: RetryPolicy,
}

impl MachineryService {
    /// Create a new machinery service instance
    pub fn new(db_pool: PgPool, retry_policy: RetryPolicy) -> Self {
        Self {
            db_pool,
            retry_policy,
        }
    }

    /// Create a listing; only users with the OWNER role may list machinery
    pub async fn create(
        &self,
        owner_id: Uuid,
        owner_role: UserRole,
        request: CreateMachineryRequest,
    ) -> Result<Machinery, MachineryError> {
        if owner_role != UserRole::Owner {
            return Err(MachineryError::NotAnOwner);
        }

        let pool = self.db_pool.clone();
        let machinery: Machinery = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            let request = &request;
            async move {
                sqlx::query_as(
                    r#"
                    INSERT INTO machinery (
                        id, owner_id, name, machinery_type, description,
                        hourly_rate, daily_rate, location, photos, available,
                        created_at, updated_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
                    RETURNING *
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(owner_id)
                .bind(&request.name)
                .bind(request.machinery_type)
                .bind(&request.description)
                .bind(request.hourly_rate)
                .bind(request.daily_rate)
                .bind(&request.location)
                .bind(&request.photos)
                .bind(request.available.unwrap_or(true))
                .bind(Utc::now())
                .fetch_one(&pool)
                .await
            }
        })
        .await?;

        tracing::info!(machinery_id = %machinery.id, owner_id = %owner_id, "Listing created");

        Ok(machinery)
    }

    /// Get a single listing by ID
    pub async fn get(&self, id: &Uuid) -> Result<Option<Machinery>, MachineryError> {
        let pool = self.db_pool.clone();
        let id = *id;
        let machinery = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            async move {
                sqlx::query_as("SELECT * FROM machinery WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&pool)
                    .await
            }
        })
        .await?;

        Ok(machinery)
    }

    /// Listing detail view with owner profile and review aggregate
    pub async fn get_details(&self, id: &Uuid) -> Result<MachineryDetails, MachineryError> {
        let machinery = self.get(id).await?.ok_or(MachineryError::NotFound)?;

        let pool = self.db_pool.clone();
        let owner_id = machinery.owner_id;
        let owner: UserSummary = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            async move {
                sqlx::query_as("SELECT id, name, role, location FROM users WHERE id = $1")
                    .bind(owner_id)
                    .fetch_one(&pool)
                    .await
            }
        })
        .await?;

        let machinery_id = machinery.id;
        let (average_rating, reviews_count): (Option<f64>, i64) =
            with_retry(&self.retry_policy, || {
                let pool = pool.clone();
                async move {
                    sqlx::query_as(
                        "SELECT AVG(rating)::double precision, COUNT(*) FROM reviews WHERE machinery_id = $1",
                    )
                    .bind(machinery_id)
                    .fetch_one(&pool)
                    .await
                }
            })
            .await?;

        Ok(MachineryDetails {
            machinery,
            owner,
            average_rating,
            reviews_count,
        })
    }

    /// Browse listings.
    ///
    /// Without an owner filter only available machinery is returned; with
    /// one, the owner's full inventory (the dashboard view).
    pub async fn list(
        &self,
        query: ListMachineryQuery,
    ) -> Result<Vec<MachineryWithOwner>, MachineryError> {
        let pool = self.db_pool.clone();
        let listings = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            let query = &query;
            async move {
                let mut builder: sqlx::QueryBuilder<sqlx::Postgres> = sqlx::QueryBuilder::new(
                    r#"
                    SELECT m.*, u.name AS owner_name, u.location AS owner_location
                    FROM machinery m
                    JOIN users u ON u.id = m.owner_id
                    WHERE 1=1
                    "#,
                );

                if let Some(owner_id) = query.owner_id {
                    builder.push(" AND m.owner_id = ");
                    builder.push_bind(owner_id);
                } else {
                    builder.push(" AND m.available = true");
                }
                if let Some(machinery_type) = query.machinery_type {
                    builder.push(" AND m.machinery_type = ");
                    builder.push_bind(machinery_type);
                }
                if let Some(location) = &query.location {
                    builder.push(" AND m.location ILIKE ");
                    builder.push_bind(format!("%{}%", location));
                }

                builder.push(" ORDER BY m.created_at DESC");

                builder
                    .build_query_as::<MachineryWithOwner>()
                    .fetch_all(&pool)
                    .await
            }
        })
        .await?;

        Ok(listings)
    }

    /// Update a listing; only its owner may do so
    pub async fn update(
        &self,
        id: &Uuid,
        actor_id: Uuid,
        request: UpdateMachineryRequest,
    ) -> Result<Machinery, MachineryError> {
        let existing = self.get(id).await?.ok_or(MachineryError::NotFound)?;

        if existing.owner_id != actor_id {
            return Err(MachineryError::NotListingOwner);
        }

        let updated = Machinery {
            name: request.name.unwrap_or(existing.name),
            machinery_type: request.machinery_type.unwrap_or(existing.machinery_type),
            description: request.description.or(existing.description),
            hourly_rate: request.hourly_rate.or(existing.hourly_rate),
            daily_rate: request.daily_rate.unwrap_or(existing.daily_rate),
            location: request.location.unwrap_or(existing.location),
            photos: request.photos.unwrap_or(existing.photos),
            available: request.available.unwrap_or(existing.available),
            ..existing
        };

        let pool = self.db_pool.clone();
        let machinery = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            let updated = &updated;
            async move {
                sqlx::query_as(
                    r#"
                    UPDATE machinery
                    SET name = $1, machinery_type = $2, description = $3,
                        hourly_rate = $4, daily_rate = $5, location = $6,
                        photos = $7, available = $8, updated_at = $9
                    WHERE id = $10
                    RETURNING *
                    "#,
                )
                .bind(&updated.name)
                .bind(updated.machinery_type)
                .bind(&updated.description)
                .bind(updated.hourly_rate)
                .bind(updated.daily_rate)
                .bind(&updated.location)
                .bind(&updated.photos)
                .bind(updated.available)
                .bind(Utc::now())
                .bind(updated.id)
                .fetch_one(&pool)
                .await
            }
        })
        .await?;

        Ok(machinery)
    }

    /// Delete a listing; only its owner may do so
    pub async fn delete(&self, id: &Uuid, actor_id: Uuid) -> Result<(), MachineryError> {
        let existing = self.get(id).await?.ok_or(MachineryError::NotFound)?;

        if existing.owner_id != actor_id {
            return Err(MachineryError::NotListingOwner);
        }

        let pool = self.db_pool.clone();
        let id = existing.id;
        with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            async move {
                sqlx::query("DELETE FROM machinery WHERE id = $1")
                    .bind(id)
                    .execute(&pool)
                    .await
            }
        })
        .await?;

        tracing::info!(machinery_id = %id, "Listing deleted");

        Ok(())
    }
}
