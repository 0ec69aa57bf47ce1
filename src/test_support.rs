//! Helpers shared by the router-level tests: an app wired to the in-memory
//! repository and a recording mail transport, plus a client that carries the
//! session cookie between requests.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use tokio::sync::Mutex;
use tower::ServiceExt;

use crate::config::{AppConfig, Environment};
use crate::db::models::{
    NewReservation, NewRoomRestriction, Reservation, Room, RoomRestriction, User,
};
use crate::db::{DatabaseRepo, MemoryRepo};
use crate::error::{AppError, AppResult};
use crate::mail::{MailData, MailTransport, Mailer};
use crate::render::Renderer;
use crate::state::AppState;

pub const ADMIN_EMAIL: &str = "admin@fortsmythe.com";
pub const ADMIN_PASSWORD: &str = "correct horse battery";

/// Keeps every message instead of delivering it.
#[derive(Default)]
pub struct RecordingTransport {
    fail: bool,
    sent: Mutex<Vec<(MailData, String)>>,
}

impl RecordingTransport {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn sent(&self) -> Vec<(MailData, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, msg: &MailData, html_body: String) -> AppResult<()> {
        if self.fail {
            return Err(AppError::Mail("connection refused".into()));
        }
        self.sent.lock().await.push((msg.clone(), html_body));
        Ok(())
    }
}

/// A store whose every call times out.
pub struct FailingRepo;

#[async_trait]
impl DatabaseRepo for FailingRepo {
    async fn insert_reservation(&self, _res: &NewReservation) -> AppResult<i32> {
        Err(AppError::Timeout)
    }

    async fn insert_room_restriction(&self, _rr: &NewRoomRestriction) -> AppResult<()> {
        Err(AppError::Timeout)
    }

    async fn book_reservation(&self, _res: &NewReservation) -> AppResult<i32> {
        Err(AppError::Timeout)
    }

    async fn search_availability_by_dates_by_room_id(
        &self,
        _start: NaiveDate,
        _end: NaiveDate,
        _room_id: i32,
    ) -> AppResult<bool> {
        Err(AppError::Timeout)
    }

    async fn search_availability_for_all_rooms(
        &self,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> AppResult<Vec<Room>> {
        Err(AppError::Timeout)
    }

    async fn get_room_by_id(&self, _id: i32) -> AppResult<Room> {
        Err(AppError::Timeout)
    }

    async fn all_rooms(&self) -> AppResult<Vec<Room>> {
        Err(AppError::Timeout)
    }

    async fn get_restrictions_for_room_by_date(
        &self,
        _room_id: i32,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> AppResult<Vec<RoomRestriction>> {
        Err(AppError::Timeout)
    }

    async fn get_user_by_id(&self, _id: i32) -> AppResult<User> {
        Err(AppError::Timeout)
    }

    async fn authenticate(&self, _email: &str, _password: &str) -> AppResult<i32> {
        Err(AppError::Timeout)
    }

    async fn all_reservations(&self) -> AppResult<Vec<Reservation>> {
        Err(AppError::Timeout)
    }

    async fn all_new_reservations(&self) -> AppResult<Vec<Reservation>> {
        Err(AppError::Timeout)
    }

    async fn get_reservation_by_id(&self, _id: i32) -> AppResult<Reservation> {
        Err(AppError::Timeout)
    }

    async fn update_reservation(&self, _res: &Reservation) -> AppResult<()> {
        Err(AppError::Timeout)
    }

    async fn delete_reservation(&self, _id: i32) -> AppResult<()> {
        Err(AppError::Timeout)
    }

    async fn update_processed_for_reservation(&self, _id: i32, _processed: bool) -> AppResult<()> {
        Err(AppError::Timeout)
    }

    async fn ping(&self) -> AppResult<Duration> {
        Err(AppError::Timeout)
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }

    /// Value of the first hidden `csrf_token` input in the body.
    pub fn csrf_token(&self) -> Option<String> {
        let marker = r#"name="csrf_token" value=""#;
        let start = self.body.find(marker)? + marker.len();
        let end = self.body[start..].find('"')?;
        Some(self.body[start..start + end].to_string())
    }
}

pub struct TestApp {
    router: Router,
    /// The seeded in-memory store. Not wired in when built with [`TestApp::with_repo`].
    pub repo: Arc<MemoryRepo>,
    pub transport: Arc<RecordingTransport>,
    pub mailer: Mailer,
    cookie: Option<String>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(false, None).await
    }

    pub async fn with_csrf() -> Self {
        Self::build(true, None).await
    }

    /// Serves requests from `store` instead of the in-memory repository.
    pub async fn with_repo(store: Arc<dyn DatabaseRepo>) -> Self {
        Self::build(false, Some(store)).await
    }

    async fn build(csrf_protection: bool, store: Option<Arc<dyn DatabaseRepo>>) -> Self {
        let mut config = AppConfig::from_env();
        config.environment = Environment::Development;
        config.use_cache = true;
        config.csrf_protection = csrf_protection;

        let repo = Arc::new(MemoryRepo::seeded().await);
        let store: Arc<dyn DatabaseRepo> = match store {
            Some(store) => store,
            None => repo.clone(),
        };
        let transport = Arc::new(RecordingTransport::default());
        let (mailer, _worker) = Mailer::start(transport.clone(), &config.mail);
        let renderer = Renderer::new(config.use_cache).unwrap();

        let state = AppState {
            config: Arc::new(config),
            repo: store,
            renderer: Arc::new(renderer),
            mailer: mailer.clone(),
        };

        Self {
            router: crate::create_app(state),
            repo,
            transport,
            mailer,
            cookie: None,
        }
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        let req = Request::get(uri);
        self.send(req.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&mut self, uri: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = serde_urlencoded::to_string(fields).unwrap();
        let req = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send(req).await
    }

    pub async fn send(&mut self, mut req: Request<Body>) -> TestResponse {
        if let Some(cookie) = &self.cookie {
            req.headers_mut()
                .insert(header::COOKIE, cookie.parse().unwrap());
        }

        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();

        if let Some(set_cookie) = headers.get(header::SET_COOKIE) {
            let pair = set_cookie
                .to_str()
                .unwrap()
                .split(';')
                .next()
                .unwrap_or_default()
                .to_string();
            let cleared = set_cookie.to_str().unwrap().contains("Max-Age=0");
            self.cookie = (!cleared && !pair.ends_with('=')).then_some(pair);
        }

        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    /// Creates the administrator account and logs in with it.
    pub async fn login_as_admin(&mut self) -> TestResponse {
        let hash = bcrypt::hash(ADMIN_PASSWORD, 4).unwrap();
        self.repo.add_user("Ada", "Smythe", ADMIN_EMAIL, &hash).await;
        let token = self.get("/user/login").await.csrf_token().unwrap_or_default();
        self.post_form(
            "/user/login",
            &[
                ("csrf_token", token.as_str()),
                ("email", ADMIN_EMAIL),
                ("password", ADMIN_PASSWORD),
            ],
        )
        .await
    }
}
