//! Database Models - structs representing database tables (used by sqlx/serde).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Restriction type ids seeded by the migrations
pub const RESTRICTION_RESERVATION: i32 = 1;
pub const RESTRICTION_OWNER_BLOCK: i32 = 2;

/// Room model
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Room {
    pub id: i32,
    pub room_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Restriction type ("Reservation", "Owner Block")
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Restriction {
    pub id: i32,
    pub restriction_name: String,
}

/// Reservation model, joined with the name of its room
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Reservation {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub room_id: i32,
    pub room_name: String,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New reservation for insertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReservation {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub room_id: i32,
}

/// A blocked date interval on a room
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct RoomRestriction {
    pub id: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub room_id: i32,
    pub reservation_id: Option<i32>,
    pub restriction_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoomRestriction {
    /// Open-interval overlap with `[start, end)`; touching ranges do not overlap.
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date < end && self.end_date > start
    }

    /// Whether `day` is one of the blocked nights.
    pub fn covers(&self, day: NaiveDate) -> bool {
        self.start_date <= day && day < self.end_date
    }
}

/// New room restriction for insertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRoomRestriction {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub room_id: i32,
    pub reservation_id: Option<i32>,
    pub restriction_id: i32,
}

/// Administrator account
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub access_level: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
