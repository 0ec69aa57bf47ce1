//! PostgreSQL implementation of [`DatabaseRepo`].

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgExecutor, PgPool};
use std::time::{Duration, Instant};

use super::models::{
    NewReservation, NewRoomRestriction, Reservation, Room, RoomRestriction, User,
    RESTRICTION_RESERVATION,
};
use super::{repository::DatabaseRepo, verify_password, with_timeout};
use crate::error::{AppError, AppResult};

const RESERVATION_SELECT: &str = r#"
    SELECT r.id, r.first_name, r.last_name, r.email, r.phone, r.start_date, r.end_date,
           r.room_id, rm.room_name, r.processed, r.created_at, r.updated_at
    FROM reservations r
    JOIN rooms rm ON rm.id = r.room_id
"#;

/// SQLSTATE raised when a SERIALIZABLE transaction loses a conflict
const SERIALIZATION_FAILURE: &str = "40001";

#[derive(Clone)]
pub struct PostgresRepo {
    pool: PgPool,
}

impl PostgresRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Check-then-insert inside one SERIALIZABLE transaction, so two guests
    /// racing for the same room and nights cannot both commit.
    async fn book_in_transaction(&self, res: &NewReservation) -> AppResult<i32> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        let overlapping =
            count_overlapping(&mut *tx, res.room_id, res.start_date, res.end_date).await?;
        if overlapping > 0 {
            return Err(AppError::RoomUnavailable {
                room_id: res.room_id,
            });
        }

        let reservation_id = insert_reservation_with(&mut *tx, res).await?;

        insert_room_restriction_with(
            &mut *tx,
            &NewRoomRestriction {
                start_date: res.start_date,
                end_date: res.end_date,
                room_id: res.room_id,
                reservation_id: Some(reservation_id),
                restriction_id: RESTRICTION_RESERVATION,
            },
        )
        .await?;

        tx.commit().await?;

        Ok(reservation_id)
    }
}

async fn insert_reservation_with<'e, E: PgExecutor<'e>>(
    executor: E,
    res: &NewReservation,
) -> Result<i32, sqlx::Error> {
    let (id,): (i32,) = sqlx::query_as(
        r#"
        INSERT INTO reservations
            (first_name, last_name, email, phone, start_date, end_date, room_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, now(), now())
        RETURNING id
        "#,
    )
    .bind(&res.first_name)
    .bind(&res.last_name)
    .bind(&res.email)
    .bind(&res.phone)
    .bind(res.start_date)
    .bind(res.end_date)
    .bind(res.room_id)
    .fetch_one(executor)
    .await?;

    Ok(id)
}

async fn insert_room_restriction_with<'e, E: PgExecutor<'e>>(
    executor: E,
    rr: &NewRoomRestriction,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO room_restrictions
            (start_date, end_date, room_id, reservation_id, restriction_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, now(), now())
        "#,
    )
    .bind(rr.start_date)
    .bind(rr.end_date)
    .bind(rr.room_id)
    .bind(rr.reservation_id)
    .bind(rr.restriction_id)
    .execute(executor)
    .await?;

    Ok(())
}

async fn count_overlapping<'e, E: PgExecutor<'e>>(
    executor: E,
    room_id: i32,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(id)
        FROM room_restrictions
        WHERE room_id = $1 AND $2 < end_date AND $3 > start_date
        "#,
    )
    .bind(room_id)
    .bind(start)
    .bind(end)
    .fetch_one(executor)
    .await?;

    Ok(count)
}

fn is_serialization_failure(err: &AppError) -> bool {
    match err {
        AppError::Database(sqlx::Error::Database(db)) => {
            db.code().as_deref() == Some(SERIALIZATION_FAILURE)
        }
        _ => false,
    }
}

#[async_trait]
impl DatabaseRepo for PostgresRepo {
    async fn insert_reservation(&self, res: &NewReservation) -> AppResult<i32> {
        with_timeout(insert_reservation_with(&self.pool, res)).await
    }

    async fn insert_room_restriction(&self, rr: &NewRoomRestriction) -> AppResult<()> {
        with_timeout(insert_room_restriction_with(&self.pool, rr)).await
    }

    async fn book_reservation(&self, res: &NewReservation) -> AppResult<i32> {
        match with_timeout(self.book_in_transaction(res)).await {
            Err(e) if is_serialization_failure(&e) => {
                tracing::warn!(room_id = res.room_id, "booking lost a serialization conflict");
                Err(AppError::RoomUnavailable {
                    room_id: res.room_id,
                })
            }
            other => other,
        }
    }

    async fn search_availability_by_dates_by_room_id(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        room_id: i32,
    ) -> AppResult<bool> {
        let count = with_timeout(count_overlapping(&self.pool, room_id, start, end)).await?;
        Ok(count == 0)
    }

    async fn search_availability_for_all_rooms(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<Room>> {
        with_timeout(
            sqlx::query_as::<_, Room>(
                r#"
                SELECT r.id, r.room_name, r.created_at, r.updated_at
                FROM rooms r
                WHERE r.id NOT IN (
                    SELECT rr.room_id FROM room_restrictions rr
                    WHERE $1 < rr.end_date AND $2 > rr.start_date
                )
                "#,
            )
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool),
        )
        .await
    }

    async fn get_room_by_id(&self, id: i32) -> AppResult<Room> {
        let room = with_timeout(
            sqlx::query_as::<_, Room>(
                "SELECT id, room_name, created_at, updated_at FROM rooms WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await?;

        room.ok_or_else(|| AppError::NotFound(format!("room {id}")))
    }

    async fn all_rooms(&self) -> AppResult<Vec<Room>> {
        with_timeout(
            sqlx::query_as::<_, Room>(
                "SELECT id, room_name, created_at, updated_at FROM rooms ORDER BY room_name",
            )
            .fetch_all(&self.pool),
        )
        .await
    }

    async fn get_restrictions_for_room_by_date(
        &self,
        room_id: i32,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<RoomRestriction>> {
        with_timeout(
            sqlx::query_as::<_, RoomRestriction>(
                r#"
                SELECT id, start_date, end_date, room_id, reservation_id, restriction_id,
                       created_at, updated_at
                FROM room_restrictions
                WHERE room_id = $1 AND $2 < end_date AND $3 > start_date
                ORDER BY start_date
                "#,
            )
            .bind(room_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool),
        )
        .await
    }

    async fn get_user_by_id(&self, id: i32) -> AppResult<User> {
        let user = with_timeout(
            sqlx::query_as::<_, User>(
                r#"
                SELECT id, first_name, last_name, email, password, access_level, created_at, updated_at
                FROM users WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await?;

        user.ok_or_else(|| AppError::NotFound(format!("user {id}")))
    }

    async fn authenticate(&self, email: &str, password: &str) -> AppResult<i32> {
        let row: Option<(i32, String)> = with_timeout(
            sqlx::query_as("SELECT id, password FROM users WHERE LOWER(email) = LOWER($1)")
                .bind(email)
                .fetch_optional(&self.pool),
        )
        .await?;

        let Some((id, password_hash)) = row else {
            return Err(AppError::NotFound(format!("user with email {email}")));
        };

        if verify_password(password, password_hash).await? {
            Ok(id)
        } else {
            Err(AppError::InvalidCredentials)
        }
    }

    async fn all_reservations(&self) -> AppResult<Vec<Reservation>> {
        let query = format!("{RESERVATION_SELECT} ORDER BY r.start_date ASC");
        with_timeout(sqlx::query_as::<_, Reservation>(&query).fetch_all(&self.pool)).await
    }

    async fn all_new_reservations(&self) -> AppResult<Vec<Reservation>> {
        let query = format!("{RESERVATION_SELECT} WHERE r.processed = false ORDER BY r.start_date ASC");
        with_timeout(sqlx::query_as::<_, Reservation>(&query).fetch_all(&self.pool)).await
    }

    async fn get_reservation_by_id(&self, id: i32) -> AppResult<Reservation> {
        let query = format!("{RESERVATION_SELECT} WHERE r.id = $1");
        let reservation = with_timeout(
            sqlx::query_as::<_, Reservation>(&query)
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await?;

        reservation.ok_or_else(|| AppError::NotFound(format!("reservation {id}")))
    }

    async fn update_reservation(&self, res: &Reservation) -> AppResult<()> {
        let result = with_timeout(
            sqlx::query(
                r#"
                UPDATE reservations
                SET first_name = $1, last_name = $2, email = $3, phone = $4, updated_at = now()
                WHERE id = $5
                "#,
            )
            .bind(&res.first_name)
            .bind(&res.last_name)
            .bind(&res.email)
            .bind(&res.phone)
            .bind(res.id)
            .execute(&self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("reservation {}", res.id)));
        }
        Ok(())
    }

    async fn delete_reservation(&self, id: i32) -> AppResult<()> {
        // room_restrictions rows go with it through ON DELETE CASCADE
        let result = with_timeout(
            sqlx::query("DELETE FROM reservations WHERE id = $1")
                .bind(id)
                .execute(&self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("reservation {id}")));
        }
        Ok(())
    }

    async fn update_processed_for_reservation(&self, id: i32, processed: bool) -> AppResult<()> {
        let result = with_timeout(
            sqlx::query("UPDATE reservations SET processed = $1, updated_at = now() WHERE id = $2")
                .bind(processed)
                .bind(id)
                .execute(&self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("reservation {id}")));
        }
        Ok(())
    }

    async fn ping(&self) -> AppResult<Duration> {
        let start = Instant::now();
        with_timeout(sqlx::query("SELECT 1").execute(&self.pool)).await?;
        Ok(start.elapsed())
    }
}

/// These run against a real database: `DATABASE_URL=... cargo test -- --ignored`
#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_pool, run_migrations, DbConfig};

    async fn repo() -> PostgresRepo {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = init_pool(&url, &DbConfig::default()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        PostgresRepo::new(pool)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn guest(room_id: i32, start: NaiveDate, end: NaiveDate) -> NewReservation {
        NewReservation {
            first_name: "John".into(),
            last_name: "Smith".into(),
            email: "john@smith.com".into(),
            phone: "123456789".into(),
            start_date: start,
            end_date: end,
            room_id,
        }
    }

    #[tokio::test]
    #[ignore]
    async fn test_inserted_reservation_reads_back() {
        let repo = repo().await;
        let new = guest(1, date(2091, 3, 1), date(2091, 3, 4));
        let id = repo.insert_reservation(&new).await.unwrap();

        let stored = repo.get_reservation_by_id(id).await.unwrap();
        assert_eq!(stored.first_name, new.first_name);
        assert_eq!(stored.last_name, new.last_name);
        assert_eq!(stored.email, new.email);
        assert_eq!(stored.phone, new.phone);
        assert_eq!(stored.start_date, new.start_date);

        repo.delete_reservation(id).await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_second_booking_for_same_nights_is_rejected() {
        let repo = repo().await;
        let new = guest(2, date(2092, 6, 10), date(2092, 6, 12));
        let id = repo.book_reservation(&new).await.unwrap();

        let clash = guest(2, date(2092, 6, 11), date(2092, 6, 13));
        let err = repo.book_reservation(&clash).await.unwrap_err();
        assert!(matches!(err, AppError::RoomUnavailable { room_id: 2 }));

        assert!(repo
            .search_availability_by_dates_by_room_id(date(2092, 6, 12), date(2092, 6, 14), 2)
            .await
            .unwrap());

        repo.delete_reservation(id).await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_missing_room_is_not_found() {
        let repo = repo().await;
        let err = repo.get_room_by_id(987_654).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
