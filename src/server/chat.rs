//! HTTP handlers for the chat surface
//!
//! `POST /chat` is the core endpoint; conversation listing and deletion
//! round out the surface. Authentication stays with the external User
//! Directory: the bearer token is resolved through the trait and the
//! handlers only ever see the resolved user id. Internal error detail is
//! logged, never returned to the client.

use crate::error::TaskoraError;
use crate::server::AppState;
use crate::storage::ToolInvocation;
use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use uuid::Uuid;

/// Request body for `POST /chat`
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Existing conversation to continue; absent starts a new thread
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// The user's message text
    pub message: String,
}

/// Response body for `POST /chat`
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    /// Conversation the turn was appended to
    pub conversation_id: String,
    /// Assistant reply text
    pub response: String,
    /// Tool invocations made during the turn (name, arguments, result)
    pub tool_calls: Vec<ToolInvocation>,
}

/// Summary entry for `GET /conversations`
#[derive(Debug, Serialize)]
pub struct ConversationSummary {
    /// Conversation id
    pub conversation_id: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Timestamp of the most recent turn
    pub updated_at: DateTime<Utc>,
}

/// JSON error body returned on every non-2xx response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Plain-language error description
    pub error: String,
}

/// Error type handlers return; renders as a status plus [`ErrorBody`]
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// 401 with a fixed message
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "authentication required")
    }

    /// 404 with a fixed message
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "conversation not found")
    }

    /// 422 with a client-safe validation message
    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    /// 500 with a generic message; the real cause goes to the log only
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    }

    /// Map a turn-handling failure onto the HTTP taxonomy
    ///
    /// Client errors keep their message; everything else collapses to a
    /// generic 500 so provider and store internals never leak.
    fn from_turn_error(err: anyhow::Error) -> Self {
        match err.downcast_ref::<TaskoraError>() {
            Some(TaskoraError::ConversationNotFound(_)) | Some(TaskoraError::Forbidden(_)) => {
                Self::not_found()
            }
            Some(TaskoraError::TaskNotFound(_)) => Self::not_found(),
            Some(TaskoraError::Validation(message)) => Self::unprocessable(message.clone()),
            _ => {
                error!("Turn failed: {:#}", err);
                Self::internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Authenticated caller, resolved from the bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Resolved user id, trusted from here on
    pub user_id: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(ApiError::unauthorized)?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(ApiError::unauthorized)?;

        match state.directory.resolve_token(token).await {
            Ok(Some(user_id)) => Ok(AuthUser { user_id }),
            Ok(None) => Err(ApiError::unauthorized()),
            Err(e) => {
                error!("User directory lookup failed: {:#}", e);
                Err(ApiError::internal())
            }
        }
    }
}

/// `POST /chat` - handle one conversational turn
pub async fn chat(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if request.message.trim().is_empty() {
        return Err(ApiError::unprocessable("message must not be empty"));
    }

    let request_id = Uuid::new_v4();
    debug!(%request_id, user = %user.user_id, "chat turn received");

    let outcome = state
        .orchestrator
        .handle_turn(
            &user.user_id,
            request.conversation_id.as_deref(),
            &request.message,
        )
        .await
        .map_err(ApiError::from_turn_error)?;

    Ok(Json(ChatResponse {
        conversation_id: outcome.conversation_id,
        response: outcome.reply,
        tool_calls: outcome.tool_calls,
    }))
}

/// `GET /conversations` - list the caller's conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    let conversations = state
        .conversations
        .list_conversations(&user.user_id)
        .map_err(|e| {
            error!("Conversation listing failed: {:#}", e);
            ApiError::internal()
        })?;

    Ok(Json(
        conversations
            .into_iter()
            .map(|meta| ConversationSummary {
                conversation_id: meta.id,
                created_at: meta.created_at,
                updated_at: meta.updated_at,
            })
            .collect(),
    ))
}

/// `DELETE /conversations/{id}` - delete a conversation and its messages
pub async fn delete_conversation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = state
        .conversations
        .delete_conversation(&user.user_id, &id)
        .map_err(|e| {
            error!("Conversation deletion failed: {:#}", e);
            ApiError::internal()
        })?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found())
    }
}
