//! Authentication service
//!
//! Core business logic for email/password authentication and JWT sessions.

use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{AuthSession, AuthTokensResponse, LoginRequest, RegisterRequest, User};
use crate::retry::{with_retry, RetryError, RetryPolicy};

use super::jwt::{generate_access_token, generate_refresh_token, verify_token, JwtError};

/// Auth service errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Database connection failed after {attempts} attempts")]
    ConnectionFailed { attempts: u32 },

    #[error("User with this email already exists")]
    EmailAlreadyRegistered,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("Session not found or revoked")]
    SessionNotFound,

    #[error("Token error: {0}")]
    TokenError(String),

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Password hashing failed: {0}")]
    HashingError(String),
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        AuthError::DatabaseError(e.to_string())
    }
}

impl From<RetryError<sqlx::Error>> for AuthError {
    fn from(e: RetryError<sqlx::Error>) -> Self {
        match e {
            RetryError::ConnectionExhausted { attempts, .. } => {
                AuthError::ConnectionFailed { attempts }
            }
            RetryError::Operation(inner) => inner.into(),
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        AuthError::TokenError(e.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::EmailAlreadyRegistered => ApiError::Conflict(e.to_string()),
            AuthError::InvalidCredentials
            | AuthError::SessionNotFound
            | AuthError::InvalidRefreshToken => ApiError::Unauthorized(e.to_string()),
            AuthError::TokenError(_) => ApiError::Unauthorized(e.to_string()),
            AuthError::UserNotFound => ApiError::NotFound(e.to_string()),
            AuthError::ConnectionFailed { attempts } => ApiError::DatabaseUnavailable { attempts },
            AuthError::DatabaseError(d) | AuthError::HashingError(d) => ApiError::DatabaseError(d),
        }
    }
}

/// Bcrypt cost used for password hashing
const BCRYPT_COST: u32 = 12;

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db_pool: PgPool,
    retry_policy: RetryPolicy,
    jwt_secret: String,
    access_token_ttl_seconds: i64,
    refresh_token_ttl_days: i64,
}

impl AuthService {
    /// Create a new AuthService
    pub fn new(
        db_pool: PgPool,
        retry_policy: RetryPolicy,
        jwt_secret: String,
        access_token_ttl_seconds: i64,
        refresh_token_ttl_days: i64,
    ) -> Self {
        Self {
            db_pool,
            retry_policy,
            jwt_secret,
            access_token_ttl_seconds,
            refresh_token_ttl_days,
        }
    }

    /// JWT signing secret (used by the auth extractor)
    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    /// Register a new user with a bcrypt-hashed password
    pub async fn register(&self, request: RegisterRequest) -> Result<User, AuthError> {
        let pool = self.db_pool.clone();
        let email = request.email.clone();
        let existing: Option<(Uuid,)> = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            let email = email.clone();
            async move {
                sqlx::query_as("SELECT id FROM users WHERE email = $1")
                    .bind(&email)
                    .fetch_optional(&pool)
                    .await
            }
        })
        .await?;

        if existing.is_some() {
            return Err(AuthError::EmailAlreadyRegistered);
        }

        let password_hash = bcrypt::hash(&request.password, BCRYPT_COST)
            .map_err(|e| AuthError::HashingError(e.to_string()))?;

        let user: User = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            let request = &request;
            let password_hash = password_hash.clone();
            async move {
                sqlx::query_as(
                    r#"
                    INSERT INTO users (id, name, email, password_hash, role, phone, location, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
                    RETURNING *
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(&request.name)
                .bind(&request.email)
                .bind(&password_hash)
                .bind(request.role)
                .bind(&request.phone)
                .bind(&request.location)
                .bind(Utc::now())
                .fetch_one(&pool)
                .await
            }
        })
        .await?;

        tracing::info!(user_id = %user.id, role = %user.role.as_str(), "User registered");

        Ok(user)
    }

    /// Authenticate a user and issue access + refresh tokens
    pub async fn login(&self, request: LoginRequest) -> Result<AuthTokensResponse, AuthError> {
        let pool = self.db_pool.clone();
        let email = request.email.clone();
        let user: Option<User> = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            let email = email.clone();
            async move {
                sqlx::query_as("SELECT * FROM users WHERE email = $1")
                    .bind(&email)
                    .fetch_optional(&pool)
                    .await
            }
        })
        .await?;

        let user = user.ok_or(AuthError::InvalidCredentials)?;

        let valid = bcrypt::verify(&request.password, &user.password_hash)
            .map_err(|e| AuthError::HashingError(e.to_string()))?;
        if !valid {
            return Err(AuthError::InvalidCredentials);
        }

        self.issue_tokens(user).await
    }

    /// Exchange a refresh token for a new token pair (rotation)
    pub async fn refresh_tokens(
        &self,
        refresh_token: &str,
    ) -> Result<AuthTokensResponse, AuthError> {
        let claims = verify_token(refresh_token, &self.jwt_secret)
            .map_err(|_| AuthError::InvalidRefreshToken)?;

        if claims.token_type != "refresh" {
            return Err(AuthError::InvalidRefreshToken);
        }

        let session = self
            .find_session(&claims.jti)
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        if session.revoked || session.expires_at < Utc::now() {
            return Err(AuthError::SessionNotFound);
        }

        // The stored hash must match the presented token
        if session.refresh_token_hash != hash_token(refresh_token) {
            return Err(AuthError::InvalidRefreshToken);
        }

        let user = self
            .get_user(&session.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        // Rotate: the old session is revoked before the new one is issued
        self.revoke_session(&claims.jti).await?;
        self.issue_tokens(user).await
    }

    /// Verify a session is still valid (not revoked, not expired)
    pub async fn verify_session(&self, jti: &str) -> Result<(), AuthError> {
        let session = self
            .find_session(jti)
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        if session.revoked || session.expires_at < Utc::now() {
            return Err(AuthError::SessionNotFound);
        }

        Ok(())
    }

    /// Revoke a single session (logout)
    pub async fn revoke_session(&self, jti: &str) -> Result<(), AuthError> {
        let pool = self.db_pool.clone();
        let jti = jti.to_string();
        with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            let jti = jti.clone();
            async move {
                sqlx::query(
                    "UPDATE auth_sessions SET revoked = true, revoked_at = $1 WHERE jti = $2",
                )
                .bind(Utc::now())
                .bind(&jti)
                .execute(&pool)
                .await
            }
        })
        .await?;

        Ok(())
    }

    /// Fetch a user by id
    pub async fn get_user(&self, user_id: &Uuid) -> Result<Option<User>, AuthError> {
        let pool = self.db_pool.clone();
        let user_id = *user_id;
        let user = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            async move {
                sqlx::query_as("SELECT * FROM users WHERE id = $1")
                    .bind(user_id)
                    .fetch_optional(&pool)
                    .await
            }
        })
        .await?;

        Ok(user)
    }

    // ===== Private helpers =====

    async fn find_session(&self, jti: &str) -> Result<Option<AuthSession>, AuthError> {
        let pool = self.db_pool.clone();
        let jti = jti.to_string();
        let session = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            let jti = jti.clone();
            async move {
                sqlx::query_as("SELECT * FROM auth_sessions WHERE jti = $1")
                    .bind(&jti)
                    .fetch_optional(&pool)
                    .await
            }
        })
        .await?;

        Ok(session)
    }

    async fn issue_tokens(&self, user: User) -> Result<AuthTokensResponse, AuthError> {
        let jti = Uuid::new_v4().to_string();

        let access_token = generate_access_token(
            &user,
            &jti,
            &self.jwt_secret,
            self.access_token_ttl_seconds,
        )?;
        let refresh_token = generate_refresh_token(
            &user,
            &jti,
            &self.jwt_secret,
            self.refresh_token_ttl_days,
        )?;

        let expires_at = Utc::now() + Duration::days(self.refresh_token_ttl_days);
        let refresh_token_hash = hash_token(&refresh_token);

        let pool = self.db_pool.clone();
        let user_id = user.id;
        with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            let jti = jti.clone();
            let refresh_token_hash = refresh_token_hash.clone();
            async move {
                sqlx::query(
                    r#"
                    INSERT INTO auth_sessions (id, user_id, jti, refresh_token_hash, expires_at, revoked, created_at)
                    VALUES ($1, $2, $3, $4, $5, false, $6)
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(user_id)
                .bind(&jti)
                .bind(&refresh_token_hash)
                .bind(expires_at)
                .bind(Utc::now())
                .execute(&pool)
                .await
            }
        })
        .await?;

        Ok(AuthTokensResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_ttl_seconds,
            user: user.into(),
        })
    }
}

/// SHA-256 hex digest of a token; refresh tokens are never stored verbatim
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token_is_stable_and_hex() {
        let a = hash_token("some-refresh-token");
        let b = hash_token("some-refresh-token");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_token_differs_per_token() {
        assert_ne!(hash_token("token-a"), hash_token("token-b"));
    }
}
