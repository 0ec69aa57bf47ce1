//! HTML rendering. Pages are `maud` functions registered by name and wrapped
//! in the public or admin layout.

pub mod admin;
pub mod calendar;
pub mod layouts;
pub mod pages;

use std::{borrow::Cow, collections::HashMap};

use axum::response::Html;
use maud::Markup;
use tower_sessions::Session;

use crate::db::models::{Reservation, Room};
use crate::error::{AppError, AppResult};
use crate::forms::Form;
use crate::session::{self, FlashKind, ReservationDraft};

pub use calendar::CalendarView;

/// Everything a page can show
#[derive(Debug, Clone, Default)]
pub struct TemplateData {
    pub string_map: HashMap<String, String>,
    pub csrf_token: String,
    pub flash: Option<String>,
    pub error: Option<String>,
    pub warning: Option<String>,
    pub form: Form,
    pub is_authenticated: bool,
    pub rooms: Vec<Room>,
    pub draft: Option<ReservationDraft>,
    pub reservation: Option<Reservation>,
    pub reservations: Vec<Reservation>,
    pub calendar: Option<CalendarView>,
}

impl TemplateData {
    pub fn string(&self, key: &str) -> &str {
        self.string_map.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn with_string(mut self, key: &str, value: impl Into<String>) -> Self {
        self.string_map.insert(key.to_string(), value.into());
        self
    }
}

pub type PageFn = fn(&TemplateData) -> Markup;
pub type LayoutFn = fn(&str, &TemplateData, Markup) -> Markup;

/// A page body paired with the layout it renders in
#[derive(Clone, Copy)]
pub struct PageTemplate {
    pub title: &'static str,
    pub layout: LayoutFn,
    pub body: PageFn,
}

impl PageTemplate {
    fn execute(&self, td: &TemplateData) -> Markup {
        (self.layout)(self.title, td, (self.body)(td))
    }
}

pub type TemplateCache = HashMap<&'static str, PageTemplate>;

/// Builds the name -> page map from every registered page.
pub fn create_template_cache() -> AppResult<TemplateCache> {
    let mut cache = TemplateCache::new();
    for (name, page) in pages::registered() {
        if cache.insert(name, page).is_some() {
            return Err(AppError::Internal(format!("page {name} registered twice")));
        }
    }
    Ok(cache)
}

pub struct Renderer {
    use_cache: bool,
    cache: TemplateCache,
}

impl Renderer {
    pub fn new(use_cache: bool) -> AppResult<Self> {
        let cache = create_template_cache()?;
        tracing::debug!(pages = cache.len(), use_cache, "template cache created");
        Ok(Self { use_cache, cache })
    }

    /// Fills in the session-derived fields. Flash messages are consumed.
    pub async fn add_default_data(&self, session: &Session, mut td: TemplateData) -> AppResult<TemplateData> {
        td.flash = session::pop_flash(session, FlashKind::Flash).await?;
        td.error = session::pop_flash(session, FlashKind::Error).await?;
        td.warning = session::pop_flash(session, FlashKind::Warning).await?;
        td.csrf_token = session::csrf_token(session).await?;
        td.is_authenticated = session::user_id(session).await?.is_some();
        Ok(td)
    }

    pub async fn render(&self, session: &Session, name: &str, td: TemplateData) -> AppResult<Html<String>> {
        let cache = if self.use_cache {
            Cow::Borrowed(&self.cache)
        } else {
            Cow::Owned(create_template_cache()?)
        };

        let page = cache
            .get(name)
            .copied()
            .ok_or_else(|| AppError::TemplateNotFound(name.to_string()))?;

        let td = self.add_default_data(session, td).await?;
        Ok(Html(page.execute(&td).into_string()))
    }
}
