//! In-memory [`DatabaseRepo`], used when no `DATABASE_URL` is configured and
//! by the handler tests. Check-then-insert happens under one write lock, which
//! gives it the same no-double-booking guarantee as the SERIALIZABLE
//! transaction in the PostgreSQL repository.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::time::Duration;
use tokio::sync::RwLock;

use super::models::{
    NewReservation, NewRoomRestriction, Reservation, Room, RoomRestriction, User,
    RESTRICTION_RESERVATION,
};
use super::{repository::DatabaseRepo, verify_password};
use crate::error::{AppError, AppResult};

#[derive(Debug, Default)]
struct MemoryState {
    rooms: Vec<Room>,
    reservations: Vec<Reservation>,
    restrictions: Vec<RoomRestriction>,
    users: Vec<User>,
    next_id: i32,
}

impl MemoryState {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn room(&self, id: i32) -> AppResult<&Room> {
        self.rooms
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound(format!("room {id}")))
    }

    fn is_available(&self, room_id: i32, start: NaiveDate, end: NaiveDate) -> bool {
        !self
            .restrictions
            .iter()
            .any(|rr| rr.room_id == room_id && rr.overlaps(start, end))
    }

    fn insert_reservation(&mut self, res: &NewReservation) -> AppResult<i32> {
        let room_name = self.room(res.room_id)?.room_name.clone();
        let id = self.next_id();
        let now = Utc::now();
        self.reservations.push(Reservation {
            id,
            first_name: res.first_name.clone(),
            last_name: res.last_name.clone(),
            email: res.email.clone(),
            phone: res.phone.clone(),
            start_date: res.start_date,
            end_date: res.end_date,
            room_id: res.room_id,
            room_name,
            processed: false,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    fn insert_room_restriction(&mut self, rr: &NewRoomRestriction) -> AppResult<()> {
        self.room(rr.room_id)?;
        let id = self.next_id();
        let now = Utc::now();
        self.restrictions.push(RoomRestriction {
            id,
            start_date: rr.start_date,
            end_date: rr.end_date,
            room_id: rr.room_id,
            reservation_id: rr.reservation_id,
            restriction_id: rr.restriction_id,
            created_at: now,
            updated_at: now,
        });
        Ok(())
    }

    fn reservation_mut(&mut self, id: i32) -> AppResult<&mut Reservation> {
        self.reservations
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound(format!("reservation {id}")))
    }
}

#[derive(Debug, Default)]
pub struct MemoryRepo {
    state: RwLock<MemoryState>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository holding the two rooms the site advertises.
    pub async fn seeded() -> Self {
        let repo = Self::new();
        repo.add_room("General's Quarters").await;
        repo.add_room("Major's Suite").await;
        repo
    }

    pub async fn add_room(&self, room_name: &str) -> i32 {
        let mut state = self.state.write().await;
        let id = state.next_id();
        let now = Utc::now();
        state.rooms.push(Room {
            id,
            room_name: room_name.to_string(),
            created_at: now,
            updated_at: now,
        });
        id
    }

    /// Adds an administrator; `password_hash` must be a bcrypt hash.
    pub async fn add_user(&self, first_name: &str, last_name: &str, email: &str, password_hash: &str) -> i32 {
        let mut state = self.state.write().await;
        let id = state.next_id();
        let now = Utc::now();
        state.users.push(User {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            password: password_hash.to_string(),
            access_level: 3,
            created_at: now,
            updated_at: now,
        });
        id
    }
}

#[async_trait]
impl DatabaseRepo for MemoryRepo {
    async fn insert_reservation(&self, res: &NewReservation) -> AppResult<i32> {
        self.state.write().await.insert_reservation(res)
    }

    async fn insert_room_restriction(&self, rr: &NewRoomRestriction) -> AppResult<()> {
        self.state.write().await.insert_room_restriction(rr)
    }

    async fn book_reservation(&self, res: &NewReservation) -> AppResult<i32> {
        let mut state = self.state.write().await;
        state.room(res.room_id)?;
        if !state.is_available(res.room_id, res.start_date, res.end_date) {
            return Err(AppError::RoomUnavailable {
                room_id: res.room_id,
            });
        }

        let reservation_id = state.insert_reservation(res)?;
        state.insert_room_restriction(&NewRoomRestriction {
            start_date: res.start_date,
            end_date: res.end_date,
            room_id: res.room_id,
            reservation_id: Some(reservation_id),
            restriction_id: RESTRICTION_RESERVATION,
        })?;

        Ok(reservation_id)
    }

    async fn search_availability_by_dates_by_room_id(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        room_id: i32,
    ) -> AppResult<bool> {
        Ok(self.state.read().await.is_available(room_id, start, end))
    }

    async fn search_availability_for_all_rooms(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<Room>> {
        let state = self.state.read().await;
        Ok(state
            .rooms
            .iter()
            .filter(|room| state.is_available(room.id, start, end))
            .cloned()
            .collect())
    }

    async fn get_room_by_id(&self, id: i32) -> AppResult<Room> {
        self.state.read().await.room(id).cloned()
    }

    async fn all_rooms(&self) -> AppResult<Vec<Room>> {
        let mut rooms = self.state.read().await.rooms.clone();
        rooms.sort_by(|a, b| a.room_name.cmp(&b.room_name));
        Ok(rooms)
    }

    async fn get_restrictions_for_room_by_date(
        &self,
        room_id: i32,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<RoomRestriction>> {
        let state = self.state.read().await;
        let mut found: Vec<RoomRestriction> = state
            .restrictions
            .iter()
            .filter(|rr| rr.room_id == room_id && rr.overlaps(start, end))
            .cloned()
            .collect();
        found.sort_by_key(|rr| rr.start_date);
        Ok(found)
    }

    async fn get_user_by_id(&self, id: i32) -> AppResult<User> {
        self.state
            .read()
            .await
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("user {id}")))
    }

    async fn authenticate(&self, email: &str, password: &str) -> AppResult<i32> {
        let user = {
            let state = self.state.read().await;
            state
                .users
                .iter()
                .find(|u| u.email.eq_ignore_ascii_case(email))
                .map(|u| (u.id, u.password.clone()))
        };

        let Some((id, password_hash)) = user else {
            return Err(AppError::NotFound(format!("user with email {email}")));
        };

        if verify_password(password, password_hash).await? {
            Ok(id)
        } else {
            Err(AppError::InvalidCredentials)
        }
    }

    async fn all_reservations(&self) -> AppResult<Vec<Reservation>> {
        let mut all = self.state.read().await.reservations.clone();
        all.sort_by_key(|r| r.start_date);
        Ok(all)
    }

    async fn all_new_reservations(&self) -> AppResult<Vec<Reservation>> {
        let mut fresh: Vec<Reservation> = self
            .state
            .read()
            .await
            .reservations
            .iter()
            .filter(|r| !r.processed)
            .cloned()
            .collect();
        fresh.sort_by_key(|r| r.start_date);
        Ok(fresh)
    }

    async fn get_reservation_by_id(&self, id: i32) -> AppResult<Reservation> {
        self.state
            .read()
            .await
            .reservations
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("reservation {id}")))
    }

    async fn update_reservation(&self, res: &Reservation) -> AppResult<()> {
        let mut state = self.state.write().await;
        let stored = state.reservation_mut(res.id)?;
        stored.first_name = res.first_name.clone();
        stored.last_name = res.last_name.clone();
        stored.email = res.email.clone();
        stored.phone = res.phone.clone();
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_reservation(&self, id: i32) -> AppResult<()> {
        let mut state = self.state.write().await;
        let before = state.reservations.len();
        state.reservations.retain(|r| r.id != id);
        if state.reservations.len() == before {
            return Err(AppError::NotFound(format!("reservation {id}")));
        }
        state.restrictions.retain(|rr| rr.reservation_id != Some(id));
        Ok(())
    }

    async fn update_processed_for_reservation(&self, id: i32, processed: bool) -> AppResult<()> {
        let mut state = self.state.write().await;
        let stored = state.reservation_mut(id)?;
        stored.processed = processed;
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn ping(&self) -> AppResult<Duration> {
        Ok(Duration::ZERO)
    }
}
