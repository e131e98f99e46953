//! User-related API handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use super::AuthenticatedUser;
use crate::error::ApiError;
use crate::models::{UserStats, UserSummary};
use crate::retry::with_retry;
use crate::state::AppState;

/// GET /api/users/:id - Public profile
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserSummary>, ApiError> {
    let pool = state.db_pool.clone();
    let user: Option<UserSummary> = with_retry(&state.retry_policy, || {
        let pool = pool.clone();
        async move {
            sqlx::query_as("SELECT id, name, role, location FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&pool)
                .await
        }
    })
    .await?;

    let user = user.ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// GET /api/users/:id/stats - Dashboard statistics (self only)
pub async fn get_user_stats(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserStats>, ApiError> {
    // Users can only view their own stats
    if user.user_id != id {
        return Err(ApiError::Forbidden(
            "Users can only view their own stats".to_string(),
        ));
    }

    let policy = state.retry_policy.clone();
    let pool = state.db_pool.clone();

    let (machinery_count,): (i64,) = with_retry(&policy, || {
        let pool = pool.clone();
        async move {
            sqlx::query_as("SELECT COUNT(*) FROM machinery WHERE owner_id = $1")
                .bind(id)
                .fetch_one(&pool)
                .await
        }
    })
    .await?;

    let (bookings_count,): (i64,) = with_retry(&policy, || {
        let pool = pool.clone();
        async move {
            sqlx::query_as(
                r#"
                SELECT COUNT(*)
                FROM bookings b
                JOIN machinery m ON m.id = b.machinery_id
                WHERE m.owner_id = $1 AND b.status IN ('CONFIRMED', 'COMPLETED')
                "#,
            )
            .bind(id)
            .fetch_one(&pool)
            .await
        }
    })
    .await?;

    let (total_earnings,): (Option<f64>,) = with_retry(&policy, || {
        let pool = pool.clone();
        async move {
            sqlx::query_as(
                r#"
                SELECT SUM(b.total_price)
                FROM bookings b
                JOIN machinery m ON m.id = b.machinery_id
                WHERE m.owner_id = $1 AND b.status = 'COMPLETED'
                "#,
            )
            .bind(id)
            .fetch_one(&pool)
            .await
        }
    })
    .await?;

    let (average_rating, reviews_count): (Option<f64>, i64) = with_retry(&policy, || {
        let pool = pool.clone();
        async move {
            sqlx::query_as(
                r#"
                SELECT AVG(r.rating)::double precision, COUNT(*)
                FROM reviews r
                JOIN machinery m ON m.id = r.machinery_id
                WHERE m.owner_id = $1
                "#,
            )
            .bind(id)
            .fetch_one(&pool)
            .await
        }
    })
    .await?;

    Ok(Json(UserStats {
        machinery_count,
        bookings_count,
        total_earnings: total_earnings.unwrap_or(0.0),
        average_rating: average_rating.unwrap_or(0.0),
        reviews_count,
    }))
}
