//! Authentication middleware
//!
//! Extracts and verifies the bearer JWT, then checks the session has not
//! been revoked.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{verify_token, AuthService};
use crate::models::UserRole;

/// Authenticated user extracted from a JWT access token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: UserRole,
    pub jti: String,
}

/// Error response for authentication failures
#[derive(Debug, Serialize)]
struct AuthError {
    error: AuthErrorDetails,
}

#[derive(Debug, Serialize)]
struct AuthErrorDetails {
    code: String,
    message: String,
}

impl AuthError {
    fn new(code: &str, message: &str) -> Self {
        Self {
            error: AuthErrorDetails {
                code: code.to_string(),
                message: message.to_string(),
            },
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(self)).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    AuthError::new(
                        "MISSING_TOKEN",
                        "Authorization header with Bearer token required",
                    )
                    .into_response()
                })?;

        let auth_service = Arc::<AuthService>::from_ref(state);

        let claims = verify_token(bearer.token(), auth_service.jwt_secret()).map_err(|e| {
            let (code, message) = if e.to_string().contains("expired") {
                ("TOKEN_EXPIRED", "Token has expired")
            } else {
                ("INVALID_TOKEN", "Invalid token")
            };
            AuthError::new(code, message).into_response()
        })?;

        if claims.token_type != "access" {
            return Err(
                AuthError::new("INVALID_TOKEN_TYPE", "Expected access token").into_response(),
            );
        }

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| {
            AuthError::new("INVALID_TOKEN", "Invalid user ID in token").into_response()
        })?;

        let role = match claims.role.as_str() {
            "OWNER" => UserRole::Owner,
            "RENTER" => UserRole::Renter,
            _ => {
                return Err(AuthError::new("INVALID_TOKEN", "Invalid role in token").into_response())
            }
        };

        // Reject tokens whose session was revoked by logout
        auth_service
            .verify_session(&claims.jti)
            .await
            .map_err(|_| {
                AuthError::new("SESSION_REVOKED", "Session has been revoked").into_response()
            })?;

        Ok(AuthenticatedUser {
            user_id,
            role,
            jti: claims.jti,
        })
    }
}
