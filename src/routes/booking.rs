/**
 * Booking Routes
 * Availability search, room choice, the reservation form and its summary
 */
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use tower_sessions::Session;

use super::{format_date, parse_date_range, redirect_with_flash, render};
use crate::db::models::Room;
use crate::error::{AppError, AppResult};
use crate::forms;
use crate::mail::MailData;
use crate::render::TemplateData;
use crate::session::{self, FlashKind, ReservationDraft};
use crate::state::AppState;

type Fields = HashMap<String, String>;

fn field<'a>(fields: &'a Fields, name: &str) -> &'a str {
    fields.get(name).map(String::as_str).unwrap_or("")
}

fn dates_td(draft: &ReservationDraft) -> TemplateData {
    TemplateData::default()
        .with_string("start_date", format_date(draft.start_date))
        .with_string("end_date", format_date(draft.end_date))
}

// ============================================================================
// Availability
// ============================================================================

/// GET /search-availability
pub async fn search_availability(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Response> {
    render(&state, &session, "search-availability.page", TemplateData::default()).await
}

/// POST /search-availability
pub async fn post_search_availability(
    State(state): State<AppState>,
    session: Session,
    Form(fields): Form<Fields>,
) -> AppResult<Response> {
    let (start, end) = match parse_date_range(field(&fields, "start"), field(&fields, "end")) {
        Ok(range) => range,
        Err(message) => return redirect_with_flash(&session, FlashKind::Error, message, "/").await,
    };

    let rooms = match state.repo.search_availability_for_all_rooms(start, end).await {
        Ok(rooms) => rooms,
        Err(e) => {
            tracing::error!(error = %e, "availability search failed");
            return redirect_with_flash(&session, FlashKind::Error, "can't get availability for rooms", "/").await;
        }
    };

    if rooms.is_empty() {
        return redirect_with_flash(
            &session,
            FlashKind::Error,
            "No availability for the requested dates",
            "/search-availability",
        )
        .await;
    }

    session::put_draft(&session, &ReservationDraft::for_dates(start, end)).await?;

    let td = TemplateData {
        rooms,
        ..TemplateData::default()
    };
    render(&state, &session, "choose-room.page", td).await
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub ok: bool,
    pub message: String,
    pub room_id: String,
    pub start_date: String,
    pub end_date: String,
}

/// POST /search-availability-json
/// Single-room check used by the room pages.
pub async fn availability_json(
    State(state): State<AppState>,
    session: Session,
    Form(fields): Form<Fields>,
) -> AppResult<Response> {
    let (sd, ed) = (field(&fields, "start"), field(&fields, "end"));
    let (start, end) = match parse_date_range(sd, ed) {
        Ok(range) => range,
        Err(message) => return redirect_with_flash(&session, FlashKind::Error, message, "/").await,
    };
    let Ok(room_id) = field(&fields, "room_id").trim().parse::<i32>() else {
        return redirect_with_flash(&session, FlashKind::Error, "invalid ID!", "/").await;
    };

    let response = match state
        .repo
        .search_availability_by_dates_by_room_id(start, end, room_id)
        .await
    {
        Ok(available) => AvailabilityResponse {
            ok: available,
            message: String::new(),
            room_id: room_id.to_string(),
            start_date: sd.to_string(),
            end_date: ed.to_string(),
        },
        Err(e) => {
            tracing::error!(error = %e, room_id, "room availability check failed");
            AvailabilityResponse {
                ok: false,
                message: "Error querying database".to_string(),
                room_id: String::new(),
                start_date: String::new(),
                end_date: String::new(),
            }
        }
    };

    Ok(Json(response).into_response())
}

// ============================================================================
// Room choice
// ============================================================================

/// GET /choose-room/{id}
pub async fn choose_room(Path(id): Path<String>, session: Session) -> AppResult<Response> {
    let Ok(room_id) = id.parse::<i32>() else {
        return redirect_with_flash(&session, FlashKind::Error, "invalid room id!", "/").await;
    };

    let Some(mut draft) = session::get_draft(&session).await? else {
        return redirect_with_flash(&session, FlashKind::Error, "can't get reservation from session", "/").await;
    };

    draft.room_id = Some(room_id);
    session::put_draft(&session, &draft).await?;

    Ok(Redirect::to("/make-reservation").into_response())
}

/// GET /book-room?id=&s=&e=
/// Starts a reservation straight from a room page.
pub async fn book_room(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<Fields>,
) -> AppResult<Response> {
    let Ok(room_id) = field(&params, "id").parse::<i32>() else {
        return redirect_with_flash(&session, FlashKind::Error, "invalid room id!", "/").await;
    };
    let (start, end) = match parse_date_range(field(&params, "s"), field(&params, "e")) {
        Ok(range) => range,
        Err(message) => return redirect_with_flash(&session, FlashKind::Error, message, "/").await,
    };

    let room = match state.repo.get_room_by_id(room_id).await {
        Ok(room) => room,
        Err(e) => {
            tracing::warn!(error = %e, room_id, "book-room lookup failed");
            return redirect_with_flash(&session, FlashKind::Error, "can't get room from db!", "/").await;
        }
    };

    let mut draft = ReservationDraft::for_dates(start, end);
    draft.room_id = Some(room.id);
    draft.room_name = room.room_name;
    session::put_draft(&session, &draft).await?;

    Ok(Redirect::to("/make-reservation").into_response())
}

// ============================================================================
// Reservation form
// ============================================================================

/// GET /make-reservation
pub async fn make_reservation(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    let Some(mut draft) = session::get_draft(&session).await? else {
        return redirect_with_flash(&session, FlashKind::Error, "can't get reservation from session", "/").await;
    };

    let room = match draft.room_id {
        Some(room_id) => state.repo.get_room_by_id(room_id).await.ok(),
        None => None,
    };
    let Some(room) = room else {
        return redirect_with_flash(&session, FlashKind::Error, "can't find room!", "/").await;
    };

    draft.room_name = room.room_name;
    session::put_draft(&session, &draft).await?;

    let td = TemplateData {
        draft: Some(draft.clone()),
        ..dates_td(&draft)
    };
    render(&state, &session, "make-reservation.page", td).await
}

/// Adds the guest-detail rules shared by the reservation forms.
pub(crate) fn validate_guest_details(form: &mut forms::Form) {
    form.required(&["first_name", "last_name", "email"]);
    form.min_length("first_name", 3);
    form.is_email("email");
}

/// POST /make-reservation
pub async fn post_make_reservation(
    State(state): State<AppState>,
    session: Session,
    Form(fields): Form<Fields>,
) -> AppResult<Response> {
    let (start, end) = match parse_date_range(field(&fields, "start_date"), field(&fields, "end_date")) {
        Ok(range) => range,
        Err(message) => return redirect_with_flash(&session, FlashKind::Error, message, "/").await,
    };
    let Ok(room_id) = field(&fields, "room_id").trim().parse::<i32>() else {
        return redirect_with_flash(&session, FlashKind::Error, "invalid ID!", "/").await;
    };

    let mut draft = session::get_draft(&session)
        .await?
        .unwrap_or_else(|| ReservationDraft::for_dates(start, end));
    if draft.room_id != Some(room_id) {
        draft.room_name.clear();
    }
    draft.first_name = field(&fields, "first_name").trim().to_string();
    draft.last_name = field(&fields, "last_name").trim().to_string();
    draft.email = field(&fields, "email").trim().to_string();
    draft.phone = field(&fields, "phone").trim().to_string();
    draft.start_date = start;
    draft.end_date = end;
    draft.room_id = Some(room_id);

    let mut form = forms::Form::new(fields);
    validate_guest_details(&mut form);

    if !form.valid() {
        session::put_draft(&session, &draft).await?;
        let td = TemplateData {
            form,
            draft: Some(draft.clone()),
            ..dates_td(&draft)
        };
        return render(&state, &session, "make-reservation.page", td).await;
    }

    let reservation_id = match state.repo.book_reservation(&draft.to_new_reservation(room_id)).await {
        Ok(id) => id,
        Err(AppError::RoomUnavailable { .. }) => {
            return redirect_with_flash(
                &session,
                FlashKind::Error,
                "Sorry, that room is no longer available for those dates",
                "/search-availability",
            )
            .await;
        }
        Err(e) => {
            tracing::error!(error = %e, room_id, "reservation insert failed");
            return redirect_with_flash(&session, FlashKind::Error, "can't insert reservation into database!", "/").await;
        }
    };

    draft.id = Some(reservation_id);
    if draft.room_name.is_empty() {
        match state.repo.get_room_by_id(room_id).await {
            Ok(Room { room_name, .. }) => draft.room_name = room_name,
            Err(e) => tracing::warn!(error = %e, room_id, "room name lookup failed"),
        }
    }

    tracing::info!(reservation_id, room_id, "reservation booked");
    send_booking_mail(&state, &draft);

    session::put_draft(&session, &draft).await?;
    Ok(Redirect::to("/reservation-summary").into_response())
}

fn mail_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Guest confirmation plus owner notification.
fn send_booking_mail(state: &AppState, draft: &ReservationDraft) {
    let mail = &state.config.mail;
    let (start, end) = (mail_date(draft.start_date), mail_date(draft.end_date));

    let guest = maud::html! {
        strong { "Reservation Confirmation" } br;
        "Dear " (draft.first_name) ":" br;
        "This is to confirm your reservation from " (start) " to " (end) "."
    };
    state.mailer.enqueue(MailData {
        to: draft.email.clone(),
        from: mail.from.clone(),
        subject: "Reservation Confirmation".to_string(),
        content: guest.into_string(),
        template: Some("basic.html".to_string()),
    });

    let owner = maud::html! {
        strong { "Reservation Notification" } br;
        "A reservation has been made for " (draft.room_name) " from " (start) " to " (end) "."
    };
    state.mailer.enqueue(MailData {
        to: mail.owner.clone(),
        from: mail.from.clone(),
        subject: "Reservation Notification".to_string(),
        content: owner.into_string(),
        template: None,
    });
}

/// GET /reservation-summary
pub async fn reservation_summary(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    let Some(draft) = session::take_draft(&session).await? else {
        tracing::warn!("reservation summary requested without a reservation in session");
        return redirect_with_flash(&session, FlashKind::Error, "can't get reservation from session", "/").await;
    };

    let td = TemplateData {
        draft: Some(draft.clone()),
        ..dates_td(&draft)
    };
    render(&state, &session, "reservation-summary.page", td).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{NewRoomRestriction, RESTRICTION_OWNER_BLOCK};
    use crate::db::DatabaseRepo;
    use crate::test_support::{FailingRepo, TestApp};
    use axum::http::StatusCode;
    use std::sync::Arc;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2050, 1, d).unwrap()
    }

    async fn block_room(app: &TestApp, room_id: i32, start: NaiveDate, end: NaiveDate) {
        app.repo
            .insert_room_restriction(&NewRoomRestriction {
                start_date: start,
                end_date: end,
                room_id,
                reservation_id: None,
                restriction_id: RESTRICTION_OWNER_BLOCK,
            })
            .await
            .unwrap();
    }

    fn guest_form<'a>(first_name: &'a str, room_id: &'a str) -> Vec<(&'a str, &'a str)> {
        vec![
            ("first_name", first_name),
            ("last_name", "Smith"),
            ("email", "john@smith.com"),
            ("phone", "555-555-5555"),
            ("start_date", "01/01/2050"),
            ("end_date", "02/01/2050"),
            ("room_id", room_id),
        ]
    }

    #[tokio::test]
    async fn test_search_lists_free_rooms() {
        let mut app = TestApp::new().await;
        let res = app
            .post_form("/search-availability", &[("start", "01/01/2050"), ("end", "02/01/2050")])
            .await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.contains("/choose-room/1"));
        assert!(res.body.contains("/choose-room/2"));
    }

    #[tokio::test]
    async fn test_search_without_availability_redirects_with_flash() {
        let mut app = TestApp::new().await;
        block_room(&app, 1, day(1), day(10)).await;
        block_room(&app, 2, day(1), day(10)).await;

        let res = app
            .post_form("/search-availability", &[("start", "01/01/2050"), ("end", "02/01/2050")])
            .await;
        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.location(), Some("/search-availability"));

        let page = app.get("/search-availability").await;
        assert!(page.body.contains("No availability for the requested dates"));
    }

    #[tokio::test]
    async fn test_search_with_bad_dates_redirects_home() {
        let mut app = TestApp::new().await;
        let res = app
            .post_form("/search-availability", &[("start", "invalid"), ("end", "02/01/2050")])
            .await;
        assert_eq!(res.location(), Some("/"));

        let res = app
            .post_form("/search-availability", &[("start", "05/01/2050"), ("end", "02/01/2050")])
            .await;
        assert_eq!(res.location(), Some("/"));
    }

    #[tokio::test]
    async fn test_availability_json() {
        let mut app = TestApp::new().await;
        block_room(&app, 1, day(1), day(10)).await;

        let res = app
            .post_form(
                "/search-availability-json",
                &[("start", "01/01/2050"), ("end", "02/01/2050"), ("room_id", "1")],
            )
            .await;
        let body: serde_json::Value = serde_json::from_str(&res.body).unwrap();
        assert_eq!(body["ok"], false);
        assert_eq!(body["room_id"], "1");

        let res = app
            .post_form(
                "/search-availability-json",
                &[("start", "01/01/2050"), ("end", "02/01/2050"), ("room_id", "2")],
            )
            .await;
        let body: serde_json::Value = serde_json::from_str(&res.body).unwrap();
        assert_eq!(body["ok"], true);
        assert_eq!(body["start_date"], "01/01/2050");

        let res = app
            .post_form(
                "/search-availability-json",
                &[("start", "01/01/2050"), ("end", "02/01/2050"), ("room_id", "x")],
            )
            .await;
        assert_eq!(res.location(), Some("/"));
    }

    #[tokio::test]
    async fn test_choose_room_without_draft_redirects_home() {
        let mut app = TestApp::new().await;
        let res = app.get("/choose-room/1").await;
        assert_eq!(res.location(), Some("/"));
        let res = app.get("/choose-room/abc").await;
        assert_eq!(res.location(), Some("/"));
    }

    #[tokio::test]
    async fn test_choose_room_then_make_reservation_shows_room() {
        let mut app = TestApp::new().await;
        app.post_form("/search-availability", &[("start", "01/01/2050"), ("end", "02/01/2050")])
            .await;

        let res = app.get("/choose-room/2").await;
        assert_eq!(res.location(), Some("/make-reservation"));

        let res = app.get("/make-reservation").await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.contains("Suite"));
        assert!(res.body.contains("01/01/2050"));
    }

    #[tokio::test]
    async fn test_make_reservation_without_draft_redirects_home() {
        let mut app = TestApp::new().await;
        let res = app.get("/make-reservation").await;
        assert_eq!(res.location(), Some("/"));
    }

    #[tokio::test]
    async fn test_book_room_builds_draft() {
        let mut app = TestApp::new().await;
        let res = app.get("/book-room?id=1&s=01/01/2050&e=02/01/2050").await;
        assert_eq!(res.location(), Some("/make-reservation"));
        assert_eq!(app.get("/make-reservation").await.status, StatusCode::OK);

        let res = app.get("/book-room?id=99&s=01/01/2050&e=02/01/2050").await;
        assert_eq!(res.location(), Some("/"));
    }

    #[tokio::test]
    async fn test_short_first_name_rerenders_form_and_stores_nothing() {
        let mut app = TestApp::new().await;
        let res = app.post_form("/make-reservation", &guest_form("J", "1")).await;

        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.contains("at least 3 characters"));
        assert!(res.body.contains("john@smith.com"));
        assert!(app.repo.all_reservations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_valid_submission_books_and_summary_is_one_shot() {
        let mut app = TestApp::new().await;
        let res = app.post_form("/make-reservation", &guest_form("John", "1")).await;
        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.location(), Some("/reservation-summary"));

        let summary = app.get("/reservation-summary").await;
        assert_eq!(summary.status, StatusCode::OK);
        assert!(summary.body.contains("John Smith"));
        assert!(summary.body.contains("Quarters"));

        let again = app.get("/reservation-summary").await;
        assert_eq!(again.status, StatusCode::SEE_OTHER);
        assert_eq!(again.location(), Some("/"));

        let stored = app.repo.all_reservations().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].first_name, "John");
        assert!(!app
            .repo
            .search_availability_by_dates_by_room_id(day(1), day(2), 1)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_second_booking_for_same_dates_is_rejected() {
        let mut app = TestApp::new().await;
        app.post_form("/make-reservation", &guest_form("John", "1")).await;

        let res = app.post_form("/make-reservation", &guest_form("Jane", "1")).await;
        assert_eq!(res.location(), Some("/search-availability"));
        assert_eq!(app.repo.all_reservations().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_booking_queues_guest_and_owner_mail() {
        let mut app = TestApp::new().await;
        app.post_form("/make-reservation", &guest_form("John", "1")).await;

        let mut sent = Vec::new();
        for _ in 0..50 {
            let stats = app.mailer.stats();
            if stats.sent + stats.failed >= 2 {
                sent = app.transport.sent().await;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let guest = sent
            .iter()
            .find(|(msg, _)| msg.subject == "Reservation Confirmation")
            .expect("guest confirmation delivered");
        assert_eq!(guest.0.to, "john@smith.com");
        assert!(guest.1.starts_with("<!DOCTYPE html>"));
        assert!(guest.1.contains("Dear John"));
        assert!(!guest.1.contains("[%body%]"));

        assert!(sent
            .iter()
            .any(|(msg, _)| msg.subject == "Reservation Notification"));
        assert_eq!(app.mailer.stats().failed, 0);
        assert_eq!(app.mailer.stats().dropped, 0);
    }

    #[tokio::test]
    async fn test_unknown_room_id_redirects_home() {
        let mut app = TestApp::new().await;
        let res = app.post_form("/make-reservation", &guest_form("John", "99")).await;
        assert_eq!(res.location(), Some("/"));
        assert!(app.repo.all_reservations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_store_failure_redirects_home_with_error() {
        let mut app = TestApp::with_repo(Arc::new(FailingRepo)).await;
        let res = app
            .post_form("/search-availability", &[("start", "01/01/2050"), ("end", "02/01/2050")])
            .await;
        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.location(), Some("/"));

        let home = app.get("/").await;
        assert!(home.body.contains("get availability for rooms"));
    }

    #[tokio::test]
    async fn test_availability_json_store_failure_keeps_every_key() {
        let mut app = TestApp::with_repo(Arc::new(FailingRepo)).await;
        let res = app
            .post_form(
                "/search-availability-json",
                &[("start", "01/01/2050"), ("end", "02/01/2050"), ("room_id", "1")],
            )
            .await;
        assert_eq!(res.status, StatusCode::OK);

        let body: serde_json::Value = serde_json::from_str(&res.body).unwrap();
        let object = body.as_object().unwrap();
        for key in ["ok", "message", "room_id", "start_date", "end_date"] {
            assert!(object.contains_key(key), "missing {key}");
        }
        assert_eq!(body["ok"], false);
        assert_eq!(body["message"], "Error querying database");
        assert_eq!(body["room_id"], "");
    }

    #[tokio::test]
    async fn test_reservation_store_failure_redirects_home_with_error() {
        let mut app = TestApp::with_repo(Arc::new(FailingRepo)).await;
        let res = app.post_form("/make-reservation", &guest_form("John", "1")).await;
        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.location(), Some("/"));

        let home = app.get("/").await;
        assert!(home.body.contains("insert reservation into database"));
        assert_eq!(app.mailer.stats().sent, 0);
    }
}
