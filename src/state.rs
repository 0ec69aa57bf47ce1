//! Shared handles passed to every handler through axum state.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DatabaseRepo;
use crate::mail::Mailer;
use crate::render::Renderer;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repo: Arc<dyn DatabaseRepo>,
    pub renderer: Arc<Renderer>,
    pub mailer: Mailer,
}
