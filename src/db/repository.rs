use async_trait::async_trait;
use chrono::NaiveDate;
use std::time::Duration;

use crate::db::models::{
    NewReservation, NewRoomRestriction, Reservation, Room, RoomRestriction, User,
};
use crate::error::AppResult;

/// Data access used by the handlers. Implemented by [`super::postgres::PostgresRepo`]
/// and by the in-memory [`super::memory::MemoryRepo`].
#[async_trait]
pub trait DatabaseRepo: Send + Sync {
    /// Inserts a reservation and returns its id.
    async fn insert_reservation(&self, res: &NewReservation) -> AppResult<i32>;

    async fn insert_room_restriction(&self, rr: &NewRoomRestriction) -> AppResult<()>;

    /// Re-checks availability, then inserts the reservation and its room
    /// restriction as one atomic unit. Fails with
    /// [`crate::error::AppError::RoomUnavailable`] when the range is taken.
    async fn book_reservation(&self, res: &NewReservation) -> AppResult<i32>;

    /// True when no restriction on `room_id` overlaps `[start, end)`.
    async fn search_availability_by_dates_by_room_id(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        room_id: i32,
    ) -> AppResult<bool>;

    /// Rooms with no overlapping restriction. Order is unspecified.
    async fn search_availability_for_all_rooms(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<Room>>;

    async fn get_room_by_id(&self, id: i32) -> AppResult<Room>;

    async fn all_rooms(&self) -> AppResult<Vec<Room>>;

    /// Restrictions on `room_id` overlapping `[start, end)`.
    async fn get_restrictions_for_room_by_date(
        &self,
        room_id: i32,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<RoomRestriction>>;

    async fn get_user_by_id(&self, id: i32) -> AppResult<User>;

    /// Returns the user id. `NotFound` for an unknown email,
    /// `InvalidCredentials` for a wrong password.
    async fn authenticate(&self, email: &str, password: &str) -> AppResult<i32>;

    async fn all_reservations(&self) -> AppResult<Vec<Reservation>>;

    /// Reservations not yet marked processed by an administrator.
    async fn all_new_reservations(&self) -> AppResult<Vec<Reservation>>;

    async fn get_reservation_by_id(&self, id: i32) -> AppResult<Reservation>;

    /// Updates guest details (name, email, phone).
    async fn update_reservation(&self, res: &Reservation) -> AppResult<()>;

    async fn delete_reservation(&self, id: i32) -> AppResult<()>;

    async fn update_processed_for_reservation(&self, id: i32, processed: bool) -> AppResult<()>;

    /// Round trip to the store, for health checks.
    async fn ping(&self) -> AppResult<Duration>;
}
