//! Application error type shared by the data access layer, the session
//! helpers, the renderer and the handlers.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("incorrect credentials")]
    InvalidCredentials,
    #[error("room {room_id} is not available for the requested dates")]
    RoomUnavailable { room_id: i32 },
    #[error("database operation timed out")]
    Timeout,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Session(#[from] tower_sessions::session::Error),
    #[error("template {0} not found in template cache")]
    TemplateNotFound(String),
    #[error("mail delivery failed: {0}")]
    Mail(String),
    #[error(transparent)]
    PasswordHash(#[from] bcrypt::BcryptError),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::RoomUnavailable { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error.message = %self, error.cause_chain = ?self, "request failed");
        } else {
            tracing::warn!(error.message = %self, "request rejected");
        }

        let reason = status.canonical_reason().unwrap_or("Error");
        let body = maud::html! {
            (maud::DOCTYPE)
            html lang="en" {
                head { meta charset="utf-8"; title { (reason) } }
                body {
                    h1 { (status.as_u16()) " " (reason) }
                    p { a href="/" { "Back to the home page" } }
                }
            }
        };

        (status, Html(body.into_string())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let res = AppError::NotFound("room 9".into()).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_unexpected_errors_map_to_500() {
        let res = AppError::TemplateNotFound("missing.page".into()).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let res = AppError::Timeout.into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
