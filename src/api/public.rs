//! Public API types

use axum::response::{IntoResponse, Response};
use http::StatusCode;

use crate::turn::TurnError;

// Errors

pub struct ApiError(anyhow::Error);

/// Convert `ApiError` into an Axum compatible response. Turn failures map
/// to their taxonomy status; anything else is a 500.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Always log the error
        tracing::error!("{}", self.0);

        let status = match self.0.downcast_ref::<TurnError>() {
            Some(TurnError::EmptyMessage) => StatusCode::BAD_REQUEST,
            Some(TurnError::ConversationNotFound(_)) => StatusCode::NOT_FOUND,
            Some(TurnError::TurnInProgress(_)) => StatusCode::CONFLICT,
            Some(TurnError::Upstream(_)) => StatusCode::BAD_GATEWAY,
            Some(TurnError::Store(_)) | None => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, format!("Something went wrong: {}", self.0)).into_response()
    }
}

/// Enables using `?` on functions that return `Result<_,
/// anyhow::Error>` to turn them into `Result<_, ApiError>`
impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

// Re-export public types from each route

pub mod chat {
    pub use crate::api::routes::chat::public::*;
}

pub mod conversations {
    pub use crate::api::routes::conversations::public::*;
}
