pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{future::Future, time::Duration};

use crate::error::{AppError, AppResult};

pub use memory::MemoryRepo;
pub use postgres::PostgresRepo;
pub use repository::DatabaseRepo;

/// Deadline applied to every data access call
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct DbConfig {
    /// `None` runs the site on the in-memory repository
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub idle_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            max_connections: std::env::var("DB_POOL_MAX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            min_connections: std::env::var("DB_POOL_MIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
        }
    }
}

/// Runs `fut` under [`QUERY_TIMEOUT`], mapping expiry to [`AppError::Timeout`].
pub async fn with_timeout<T, E, F>(fut: F) -> AppResult<T>
where
    F: Future<Output = Result<T, E>>,
    AppError: From<E>,
{
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result.map_err(AppError::from),
        Err(_) => Err(AppError::Timeout),
    }
}

/// bcrypt comparison, run on the blocking pool.
pub(crate) async fn verify_password(password: &str, password_hash: String) -> AppResult<bool> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &password_hash))
        .await
        .map_err(|e| AppError::Internal(format!("password check task failed: {e}")))?
        .map_err(AppError::from)
}

pub async fn init_pool(url: &str, config: &DbConfig) -> Result<PgPool, sqlx::Error> {
    tracing::info!("Initializing database connection pool...");
    tracing::debug!(
        "Database URL: {}",
        url.replace(
            |c: char| !c.is_ascii_alphanumeric() && c != ':' && c != '/' && c != '@' && c != '.',
            "*"
        )
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(QUERY_TIMEOUT)
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect(url)
        .await?;

    sqlx::query("SELECT 1").fetch_one(&pool).await?;

    tracing::info!("Database connection pool initialized successfully");

    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rooms (
            id SERIAL PRIMARY KEY,
            room_name TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS restrictions (
            id SERIAL PRIMARY KEY,
            restriction_name TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reservations (
            id SERIAL PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT NOT NULL,
            phone TEXT NOT NULL DEFAULT '',
            start_date DATE NOT NULL,
            end_date DATE NOT NULL,
            room_id INTEGER NOT NULL REFERENCES rooms(id),
            processed BOOLEAN NOT NULL DEFAULT false,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS room_restrictions (
            id SERIAL PRIMARY KEY,
            start_date DATE NOT NULL,
            end_date DATE NOT NULL,
            room_id INTEGER NOT NULL REFERENCES rooms(id),
            reservation_id INTEGER REFERENCES reservations(id) ON DELETE CASCADE,
            restriction_id INTEGER NOT NULL REFERENCES restrictions(id),
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id SERIAL PRIMARY KEY,
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            email TEXT UNIQUE NOT NULL,
            password TEXT NOT NULL,
            access_level INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::raw_sql(
        r#"
        CREATE INDEX IF NOT EXISTS idx_room_restrictions_room_dates
            ON room_restrictions(room_id, start_date, end_date);
        CREATE INDEX IF NOT EXISTS idx_room_restrictions_reservation_id
            ON room_restrictions(reservation_id);
        CREATE INDEX IF NOT EXISTS idx_reservations_email
            ON reservations(email);
        CREATE INDEX IF NOT EXISTS idx_reservations_processed
            ON reservations(processed)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO rooms (id, room_name) VALUES
            (1, 'General''s Quarters'),
            (2, 'Major''s Suite')
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO restrictions (id, restriction_name) VALUES
            (1, 'Reservation'),
            (2, 'Owner Block')
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .execute(pool)
    .await?;

    // Explicit ids above leave the sequences behind
    sqlx::raw_sql(
        r#"
        SELECT setval(pg_get_serial_sequence('rooms', 'id'), (SELECT MAX(id) FROM rooms));
        SELECT setval(pg_get_serial_sequence('restrictions', 'id'), (SELECT MAX(id) FROM restrictions))
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_config_default_uses_env_or_fallback() {
        let config = DbConfig::default();
        assert!(config.max_connections >= 1);
        assert!(config.idle_timeout_secs >= 1);
    }

    #[tokio::test]
    async fn test_with_timeout_passes_through_results() {
        let ok: AppResult<i32> = with_timeout(async { Ok::<_, sqlx::Error>(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err: AppResult<i32> =
            with_timeout(async { Err::<i32, _>(sqlx::Error::RowNotFound) }).await;
        assert!(matches!(err, Err(AppError::Database(sqlx::Error::RowNotFound))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_expires_slow_calls() {
        let slow = async {
            tokio::time::sleep(QUERY_TIMEOUT * 2).await;
            Ok::<_, sqlx::Error>(())
        };
        assert!(matches!(with_timeout(slow).await, Err(AppError::Timeout)));
    }
}
