//! Machinery-related API handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use super::AuthenticatedUser;
use crate::error::ApiError;
use crate::machinery::{
    CreateMachineryRequest, ListMachineryQuery, Machinery, MachineryDetails, MachineryWithOwner,
    UpdateMachineryRequest,
};
use crate::state::AppState;

/// GET /api/machinery - Browse listings (public)
pub async fn list_machinery(
    State(state): State<AppState>,
    Query(query): Query<ListMachineryQuery>,
) -> Result<Json<Vec<MachineryWithOwner>>, ApiError> {
    let listings = state.machinery_service.list(query).await?;

    Ok(Json(listings))
}

/// GET /api/machinery/:id - Listing detail with owner and review aggregate
pub async fn get_machinery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MachineryDetails>, ApiError> {
    let details = state.machinery_service.get_details(&id).await?;

    Ok(Json(details))
}

/// POST /api/machinery - Create a listing (owners only)
pub async fn create_machinery(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreateMachineryRequest>,
) -> Result<(StatusCode, Json<Machinery>), ApiError> {
    req.validate()?;

    let machinery = state
        .machinery_service
        .create(user.user_id, user.role, req)
        .await?;

    Ok((StatusCode::CREATED, Json(machinery)))
}

/// PUT /api/machinery/:id - Update a listing (its owner only)
pub async fn update_machinery(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateMachineryRequest>,
) -> Result<Json<Machinery>, ApiError> {
    req.validate()?;

    let machinery = state
        .machinery_service
        .update(&id, user.user_id, req)
        .await?;

    Ok(Json(machinery))
}

/// DELETE /api/machinery/:id - Remove a listing (its owner only)
pub async fn delete_machinery(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.machinery_service.delete(&id, user.user_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
