//! Typed view over the visitor's session: the reservation in progress, the
//! logged-in administrator, the CSRF token and one-shot messages.

use chrono::NaiveDate;
use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::db::models::NewReservation;
use crate::error::AppResult;

const DRAFT_KEY: &str = "reservation";
const USER_ID_KEY: &str = "user_id";
const CSRF_KEY: &str = "csrf_token";

const CSRF_TOKEN_LEN: usize = 32;

/// Reservation carried between the booking steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationDraft {
    /// Set once the reservation has been stored
    pub id: Option<i32>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub room_id: Option<i32>,
    pub room_name: String,
}

impl ReservationDraft {
    pub fn for_dates(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            id: None,
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            phone: String::new(),
            start_date,
            end_date,
            room_id: None,
            room_name: String::new(),
        }
    }

    pub fn to_new_reservation(&self, room_id: i32) -> NewReservation {
        NewReservation {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            room_id,
        }
    }
}

/// One-shot message slots shown at the top of the next rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Flash,
    Error,
    Warning,
}

impl FlashKind {
    fn key(self) -> &'static str {
        match self {
            FlashKind::Flash => "flash",
            FlashKind::Error => "error",
            FlashKind::Warning => "warning",
        }
    }
}

pub async fn put_draft(session: &Session, draft: &ReservationDraft) -> AppResult<()> {
    session.insert(DRAFT_KEY, draft).await?;
    Ok(())
}

pub async fn get_draft(session: &Session) -> AppResult<Option<ReservationDraft>> {
    Ok(session.get(DRAFT_KEY).await?)
}

/// Reads and clears the draft.
pub async fn take_draft(session: &Session) -> AppResult<Option<ReservationDraft>> {
    Ok(session.remove(DRAFT_KEY).await?)
}

pub async fn put_flash(session: &Session, kind: FlashKind, message: impl Into<String>) -> AppResult<()> {
    session.insert(kind.key(), message.into()).await?;
    Ok(())
}

pub async fn pop_flash(session: &Session, kind: FlashKind) -> AppResult<Option<String>> {
    Ok(session.remove(kind.key()).await?)
}

pub async fn user_id(session: &Session) -> AppResult<Option<i32>> {
    Ok(session.get(USER_ID_KEY).await?)
}

pub async fn put_user_id(session: &Session, id: i32) -> AppResult<()> {
    session.insert(USER_ID_KEY, id).await?;
    Ok(())
}

/// Token embedded in forms; created on first use.
pub async fn csrf_token(session: &Session) -> AppResult<String> {
    if let Some(token) = session.get::<String>(CSRF_KEY).await? {
        return Ok(token);
    }
    let token = Alphanumeric.sample_string(&mut rand::rng(), CSRF_TOKEN_LEN);
    session.insert(CSRF_KEY, &token).await?;
    Ok(token)
}

/// Token stored for this session, without creating one.
pub async fn existing_csrf_token(session: &Session) -> AppResult<Option<String>> {
    Ok(session.get(CSRF_KEY).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tower_sessions::MemoryStore;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2050, 1, d).unwrap()
    }

    #[tokio::test]
    async fn test_take_draft_is_one_shot() {
        let session = session();
        let mut draft = ReservationDraft::for_dates(day(1), day(2));
        draft.room_id = Some(1);
        put_draft(&session, &draft).await.unwrap();

        assert_eq!(get_draft(&session).await.unwrap(), Some(draft.clone()));
        assert_eq!(take_draft(&session).await.unwrap(), Some(draft));
        assert_eq!(take_draft(&session).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_flash_kinds_are_separate_slots() {
        let session = session();
        put_flash(&session, FlashKind::Error, "bad").await.unwrap();
        put_flash(&session, FlashKind::Flash, "good").await.unwrap();

        assert_eq!(pop_flash(&session, FlashKind::Warning).await.unwrap(), None);
        assert_eq!(pop_flash(&session, FlashKind::Error).await.unwrap().as_deref(), Some("bad"));
        assert_eq!(pop_flash(&session, FlashKind::Error).await.unwrap(), None);
        assert_eq!(pop_flash(&session, FlashKind::Flash).await.unwrap().as_deref(), Some("good"));
    }

    #[tokio::test]
    async fn test_csrf_token_is_stable_per_session() {
        let session = session();
        assert_eq!(existing_csrf_token(&session).await.unwrap(), None);

        let token = csrf_token(&session).await.unwrap();
        assert_eq!(token.len(), CSRF_TOKEN_LEN);
        assert_eq!(csrf_token(&session).await.unwrap(), token);
        assert_eq!(existing_csrf_token(&session).await.unwrap(), Some(token));
    }
}
