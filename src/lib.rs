//! Hotel Bookings - library for app logic and testing

pub mod config;
pub mod csrf;
pub mod db;
pub mod error;
pub mod forms;
pub mod logging;
pub mod mail;
pub mod render;
pub mod routes;
pub mod session;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    catch_panic::CatchPanicLayer, compression::CompressionLayer, limit::RequestBodyLimitLayer,
    services::ServeDir, trace::TraceLayer,
};
use tower_sessions::{
    cookie::{time::Duration as CookieDuration, SameSite},
    Expiry, MemoryStore, SessionManagerLayer,
};

use crate::config::AppConfig;
use crate::db::{DatabaseRepo, MemoryRepo, PostgresRepo};
use crate::mail::{Mailer, SmtpMailTransport};
use crate::render::Renderer;
use crate::state::AppState;

/// Routes under `/admin`, all behind the login guard.
fn admin_routes() -> Router<AppState> {
    use routes::admin;

    Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/reservations-new", get(admin::new_reservations))
        .route("/reservations-all", get(admin::all_reservations))
        .route(
            "/reservations-calendar",
            get(admin::calendar).post(admin::block_dates),
        )
        .route(
            "/reservations/{src}/{id}",
            get(admin::show_reservation).post(admin::update_reservation),
        )
        .route("/process-reservation/{src}/{id}", post(admin::process_reservation))
        .route("/delete-reservation/{src}/{id}", post(admin::delete_reservation))
        .route_layer(middleware::from_fn(routes::auth::require_auth))
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    use routes::{auth, booking, health, pages};

    let sessions = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(state.config.in_production())
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(CookieDuration::hours(
            state.config.session_lifetime_hours,
        )));

    Router::new()
        .route("/", get(pages::home))
        .route("/about", get(pages::about))
        .route("/generals-quarters", get(pages::generals))
        .route("/majors-suite", get(pages::majors))
        .route("/contact", get(pages::contact))
        .route(
            "/search-availability",
            get(booking::search_availability).post(booking::post_search_availability),
        )
        .route("/search-availability-json", post(booking::availability_json))
        .route("/choose-room/{id}", get(booking::choose_room))
        .route("/book-room", get(booking::book_room))
        .route(
            "/make-reservation",
            get(booking::make_reservation).post(booking::post_make_reservation),
        )
        .route("/reservation-summary", get(booking::reservation_summary))
        .route("/user/login", get(auth::login_page).post(auth::login))
        .route("/user/logout", get(auth::logout))
        .nest("/admin", admin_routes())
        .route("/health", get(health::health_ping))
        .route("/health/detailed", get(health::health_detailed))
        .nest_service("/static", ServeDir::new(&state.config.static_dir))
        .layer(CatchPanicLayer::new())
        .layer(middleware::from_fn_with_state(state.clone(), csrf::verify_csrf))
        .layer(sessions)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        // Compress responses with gzip automatically
        .layer(CompressionLayer::new())
        // Global 2 MB request body cap
        .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024))
        .with_state(state)
}

/// PostgreSQL when configured and reachable, otherwise the seeded in-memory store.
async fn connect_repo(config: &AppConfig) -> anyhow::Result<Arc<dyn DatabaseRepo>> {
    if let Some(url) = &config.database.url {
        match db::init_pool(url, &config.database).await {
            Ok(pool) => {
                db::run_migrations(&pool).await?;
                return Ok(Arc::new(PostgresRepo::new(pool)));
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to initialize database pool: {}. Continuing with in-memory storage.",
                    e
                );
            }
        }
    } else {
        tracing::info!("DATABASE_URL not set. Running with in-memory storage.");
    }

    let repo = MemoryRepo::seeded().await;
    if let Some((email, password_hash)) = &config.admin_seed {
        repo.add_user("Site", "Administrator", email, password_hash).await;
        tracing::info!(%email, "administrator seeded into in-memory storage");
    }
    Ok(Arc::new(repo))
}

/// Run the server (used by main).
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env();

    // Held for the programme's lifetime; dropping them stops the log writers.
    let _log_guards = logging::init(&config.log, config.environment)?;

    routes::health::init_start_time();

    if config.in_production() && !config.csrf_protection {
        tracing::warn!("SECURITY: CSRF_PROTECTION is disabled in production");
    }

    let repo = connect_repo(&config).await?;
    let renderer = Renderer::new(config.use_cache)?;
    let transport = Arc::new(SmtpMailTransport::new(&config.mail.host, config.mail.port));
    let (mailer, _mail_worker) = Mailer::start(transport, &config.mail);

    let addr = config.socket_addr()?;
    let state = AppState {
        config: Arc::new(config),
        repo,
        renderer: Arc::new(renderer),
        mailer,
    };

    let app = create_app(state);

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
