/**
 * Authentication Routes
 * Session-based administrator login, logout and the admin guard
 */
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use std::collections::HashMap;
use tower_sessions::Session;

use super::{redirect_with_flash, render};
use crate::error::{AppError, AppResult};
use crate::forms;
use crate::render::TemplateData;
use crate::session::{self, FlashKind};
use crate::state::AppState;

/// GET /user/login
pub async fn login_page(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    render(&state, &session, "login.page", TemplateData::default()).await
}

/// POST /user/login
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(fields): Form<HashMap<String, String>>,
) -> AppResult<Response> {
    let mut form = forms::Form::new(fields);
    form.required(&["email", "password"]);
    form.is_email("email");

    if !form.valid() {
        let td = TemplateData {
            form,
            ..TemplateData::default()
        };
        return render(&state, &session, "login.page", td).await;
    }

    let email = form.get("email").trim();
    match state.repo.authenticate(email, form.get("password")).await {
        Ok(user_id) => {
            // New session id on privilege change
            session.cycle_id().await?;
            session::put_user_id(&session, user_id).await?;
            tracing::info!(user_id, "administrator logged in");
            redirect_with_flash(&session, FlashKind::Flash, "Logged in successfully", "/").await
        }
        Err(AppError::NotFound(_) | AppError::InvalidCredentials) => {
            tracing::warn!(email, "failed login attempt");
            redirect_with_flash(&session, FlashKind::Error, "Invalid login credentials", "/user/login").await
        }
        Err(e) => {
            tracing::error!(error = %e, "login lookup failed");
            redirect_with_flash(
                &session,
                FlashKind::Error,
                "Unable to log in right now, please try again",
                "/user/login",
            )
            .await
        }
    }
}

/// GET /user/logout
pub async fn logout(session: Session) -> AppResult<Response> {
    session.flush().await?;
    Ok(Redirect::to("/user/login").into_response())
}

/// Guards the admin area: visitors without a logged-in session are sent to
/// the login page.
pub async fn require_auth(session: Session, request: Request, next: Next) -> Response {
    match session::user_id(&session).await {
        Ok(Some(_)) => next.run(request).await,
        Ok(None) => redirect_with_flash(&session, FlashKind::Error, "Log in first!", "/user/login")
            .await
            .into_response(),
        Err(e) => e.into_response(),
    }
}
