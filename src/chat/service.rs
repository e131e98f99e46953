//! Chat service layer - Direct messages and derived conversations

use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;
use crate::retry::{with_retry, RetryError, RetryPolicy};

use super::{
    ChatMessage, ConversationSummary, InitiateChatRequest, InitiateChatResponse,
    MessageWithUsers, SendMessageRequest,
};

/// Chat service errors
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("User not found")]
    UserNotFound,

    #[error("Cannot message yourself")]
    SelfMessage,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Database connection failed after {attempts} attempts")]
    ConnectionFailed { attempts: u32 },
}

impl From<sqlx::Error> for ChatError {
    fn from(e: sqlx::Error) -> Self {
        ChatError::DatabaseError(e.to_string())
    }
}

impl From<RetryError<sqlx::Error>> for ChatError {
    fn from(e: RetryError<sqlx::Error>) -> Self {
        match e {
            RetryError::ConnectionExhausted { attempts, .. } => {
                ChatError::ConnectionFailed { attempts }
            }
            RetryError::Operation(inner) => inner.into(),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::UserNotFound => ApiError::NotFound(e.to_string()),
            ChatError::SelfMessage => ApiError::BadRequest(e.to_string()),
            ChatError::ConnectionFailed { attempts } => ApiError::DatabaseUnavailable { attempts },
            ChatError::DatabaseError(d) => ApiError::DatabaseError(d),
        }
    }
}

/// Default greeting used when a conversation is bootstrapped from a listing
const LISTING_GREETING: &str = "Hi, I'm interested in your machinery.";
const GENERIC_GREETING: &str = "Hi, I'd like to connect with you.";

/// Chat service
#[derive(Clone)]
pub struct ChatService {
    db_pool: PgPool,
    retry_policy: RetryPolicy,
}

impl ChatService {
    /// Create a new chat service instance
    pub fn new(db_pool: PgPool, retry_policy: RetryPolicy) -> Self {
        Self {
            db_pool,
            retry_policy,
        }
    }

    /// Bootstrap a conversation between two users.
    ///
    /// Idempotent: if any message already exists between the pair (scoped
    /// to the machinery when given), that conversation is returned instead
    /// of a new greeting being sent.
    pub async fn initiate(
        &self,
        sender_id: Uuid,
        request: InitiateChatRequest,
    ) -> Result<InitiateChatResponse, ChatError> {
        if sender_id == request.receiver_id {
            return Err(ChatError::SelfMessage);
        }

        self.ensure_user_exists(request.receiver_id).await?;

        let pool = self.db_pool.clone();
        let receiver_id = request.receiver_id;
        let machinery_id = request.machinery_id;

        let existing: Option<ChatMessage> = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            async move {
                sqlx::query_as(
                    r#"
                    SELECT * FROM chat_messages
                    WHERE ((sender_id = $1 AND receiver_id = $2)
                        OR (sender_id = $2 AND receiver_id = $1))
                      AND ($3::uuid IS NULL OR machinery_id = $3)
                    ORDER BY created_at DESC
                    LIMIT 1
                    "#,
                )
                .bind(sender_id)
                .bind(receiver_id)
                .bind(machinery_id)
                .fetch_optional(&pool)
                .await
            }
        })
        .await?;

        if let Some(message) = existing {
            return Ok(InitiateChatResponse {
                chat_id: message.id,
                sender_id: message.sender_id,
                receiver_id: message.receiver_id,
                existing: true,
            });
        }

        let greeting = if machinery_id.is_some() {
            LISTING_GREETING
        } else {
            GENERIC_GREETING
        };

        let message = self
            .insert_message(sender_id, receiver_id, greeting, machinery_id, None)
            .await?;

        Ok(InitiateChatResponse {
            chat_id: message.id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            existing: false,
        })
    }

    /// Send a message
    pub async fn send_message(
        &self,
        sender_id: Uuid,
        request: SendMessageRequest,
    ) -> Result<ChatMessage, ChatError> {
        if sender_id == request.receiver_id {
            return Err(ChatError::SelfMessage);
        }

        self.ensure_user_exists(request.receiver_id).await?;

        self.insert_message(
            sender_id,
            request.receiver_id,
            &request.body,
            request.machinery_id,
            request.booking_id,
        )
        .await
    }

    /// Fetch the full conversation between two users (oldest first) and
    /// mark messages addressed to the caller as read
    pub async fn conversation_with(
        &self,
        user_id: Uuid,
        other_user_id: Uuid,
    ) -> Result<Vec<MessageWithUsers>, ChatError> {
        let pool = self.db_pool.clone();

        let messages: Vec<MessageWithUsers> = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            async move {
                sqlx::query_as(
                    r#"
                    SELECT c.*, s.name AS sender_name, r.name AS receiver_name
                    FROM chat_messages c
                    JOIN users s ON s.id = c.sender_id
                    JOIN users r ON r.id = c.receiver_id
                    WHERE (c.sender_id = $1 AND c.receiver_id = $2)
                       OR (c.sender_id = $2 AND c.receiver_id = $1)
                    ORDER BY c.created_at ASC
                    "#,
                )
                .bind(user_id)
                .bind(other_user_id)
                .fetch_all(&pool)
                .await
            }
        })
        .await?;

        // Everything the counterpart sent is now read
        with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            async move {
                sqlx::query(
                    r#"
                    UPDATE chat_messages
                    SET is_read = true
                    WHERE sender_id = $1 AND receiver_id = $2 AND is_read = false
                    "#,
                )
                .bind(other_user_id)
                .bind(user_id)
                .execute(&pool)
                .await
            }
        })
        .await?;

        Ok(messages)
    }

    /// List the caller's conversations: the latest message per counterpart
    pub async fn conversations(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ConversationSummary>, ChatError> {
        let pool = self.db_pool.clone();
        let conversations = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            async move {
                sqlx::query_as(
                    r#"
                    SELECT DISTINCT ON (CASE WHEN c.sender_id = $1 THEN c.receiver_id ELSE c.sender_id END)
                        c.id, c.body, c.is_read, c.created_at,
                        c.sender_id, c.receiver_id, c.machinery_id,
                        CASE WHEN c.sender_id = $1 THEN c.receiver_id ELSE c.sender_id END AS counterpart_id,
                        u.name AS counterpart_name,
                        u.role AS counterpart_role
                    FROM chat_messages c
                    JOIN users u
                      ON u.id = CASE WHEN c.sender_id = $1 THEN c.receiver_id ELSE c.sender_id END
                    WHERE c.sender_id = $1 OR c.receiver_id = $1
                    ORDER BY CASE WHEN c.sender_id = $1 THEN c.receiver_id ELSE c.sender_id END,
                             c.created_at DESC
                    "#,
                )
                .bind(user_id)
                .fetch_all(&pool)
                .await
            }
        })
        .await?;

        Ok(conversations)
    }

    // ===== Private helpers =====

    async fn ensure_user_exists(&self, user_id: Uuid) -> Result<(), ChatError> {
        let pool = self.db_pool.clone();
        let exists: Option<(Uuid,)> = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            async move {
                sqlx::query_as("SELECT id FROM users WHERE id = $1")
                    .bind(user_id)
                    .fetch_optional(&pool)
                    .await
            }
        })
        .await?;

        if exists.is_none() {
            return Err(ChatError::UserNotFound);
        }

        Ok(())
    }

    async fn insert_message(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        body: &str,
        machinery_id: Option<Uuid>,
        booking_id: Option<Uuid>,
    ) -> Result<ChatMessage, ChatError> {
        let pool = self.db_pool.clone();
        let body = body.to_string();
        let message = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            let body = body.clone();
            async move {
                sqlx::query_as(
                    r#"
                    INSERT INTO chat_messages (
                        id, sender_id, receiver_id, body, machinery_id,
                        booking_id, is_read, created_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, false, $7)
                    RETURNING *
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(sender_id)
                .bind(receiver_id)
                .bind(&body)
                .bind(machinery_id)
                .bind(booking_id)
                .bind(Utc::now())
                .fetch_one(&pool)
                .await
            }
        })
        .await?;

        Ok(message)
    }
}
