/**
 * Static Page Routes
 */
use axum::{extract::State, response::Response};
use tower_sessions::Session;

use super::render;
use crate::error::AppResult;
use crate::render::TemplateData;
use crate::state::AppState;

/// GET /
pub async fn home(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    render(&state, &session, "home.page", TemplateData::default()).await
}

/// GET /about
pub async fn about(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    render(&state, &session, "about.page", TemplateData::default()).await
}

/// GET /generals-quarters
pub async fn generals(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    render(&state, &session, "generals.page", TemplateData::default()).await
}

/// GET /majors-suite
pub async fn majors(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    render(&state, &session, "majors.page", TemplateData::default()).await
}

/// GET /contact
pub async fn contact(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    render(&state, &session, "contact.page", TemplateData::default()).await
}
