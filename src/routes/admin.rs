/**
 * Admin Routes
 * Reservation lists, detail/edit, processing, deletion and the calendar.
 * Mounted behind `auth::require_auth`.
 */
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use chrono::{Datelike, NaiveDate, Utc};
use std::collections::HashMap;
use tower_sessions::Session;

use super::{booking::validate_guest_details, parse_date_range, redirect_with_flash, render};
use crate::db::models::{NewRoomRestriction, Reservation, RESTRICTION_OWNER_BLOCK};
use crate::error::{AppError, AppResult};
use crate::forms;
use crate::render::{CalendarView, TemplateData};
use crate::session::{self, FlashKind};
use crate::state::AppState;

type Fields = HashMap<String, String>;

/// List a reservation was opened from; "back" links return there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    New,
    All,
    Calendar,
}

impl Source {
    fn parse(src: &str) -> AppResult<Self> {
        match src {
            "new" => Ok(Source::New),
            "all" => Ok(Source::All),
            "cal" => Ok(Source::Calendar),
            other => Err(AppError::NotFound(format!("reservation list {other}"))),
        }
    }

    fn back_url(self, res: &Reservation) -> String {
        match self {
            Source::New => "/admin/reservations-new".to_string(),
            Source::All => "/admin/reservations-all".to_string(),
            Source::Calendar => calendar_url(res.start_date),
        }
    }
}

fn calendar_url(day: NaiveDate) -> String {
    format!(
        "/admin/reservations-calendar?y={}&m={:02}",
        day.year(),
        day.month()
    )
}

/// GET /admin/dashboard
pub async fn dashboard(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    let user_id = session::user_id(&session)
        .await?
        .ok_or_else(|| AppError::Internal("admin route reached without a user".into()))?;
    let user = state.repo.get_user_by_id(user_id).await?;
    let reservations = state.repo.all_new_reservations().await?;

    let td = TemplateData {
        reservations,
        ..TemplateData::default()
    }
    .with_string("user_name", format!("{} {}", user.first_name, user.last_name));
    render(&state, &session, "admin-dashboard.page", td).await
}

/// GET /admin/reservations-new
pub async fn new_reservations(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    let td = TemplateData {
        reservations: state.repo.all_new_reservations().await?,
        ..TemplateData::default()
    };
    render(&state, &session, "admin-new-reservations.page", td).await
}

/// GET /admin/reservations-all
pub async fn all_reservations(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    let td = TemplateData {
        reservations: state.repo.all_reservations().await?,
        ..TemplateData::default()
    };
    render(&state, &session, "admin-all-reservations.page", td).await
}

fn show_td(src: &str, source: Source, res: Reservation, form: forms::Form) -> TemplateData {
    let back = source.back_url(&res);
    TemplateData {
        reservation: Some(res),
        form,
        ..TemplateData::default()
    }
    .with_string("src", src)
    .with_string("back", back)
}

/// GET /admin/reservations/{src}/{id}
pub async fn show_reservation(
    State(state): State<AppState>,
    session: Session,
    Path((src, id)): Path<(String, i32)>,
) -> AppResult<Response> {
    let source = Source::parse(&src)?;
    let res = state.repo.get_reservation_by_id(id).await?;
    let td = show_td(&src, source, res, forms::Form::default());
    render(&state, &session, "admin-reservations-show.page", td).await
}

/// POST /admin/reservations/{src}/{id}
pub async fn update_reservation(
    State(state): State<AppState>,
    session: Session,
    Path((src, id)): Path<(String, i32)>,
    Form(fields): Form<Fields>,
) -> AppResult<Response> {
    let source = Source::parse(&src)?;
    let mut res = state.repo.get_reservation_by_id(id).await?;

    let mut form = forms::Form::new(fields);
    validate_guest_details(&mut form);
    if !form.valid() {
        let td = show_td(&src, source, res, form);
        return render(&state, &session, "admin-reservations-show.page", td).await;
    }

    res.first_name = form.get("first_name").trim().to_string();
    res.last_name = form.get("last_name").trim().to_string();
    res.email = form.get("email").trim().to_string();
    res.phone = form.get("phone").trim().to_string();
    state.repo.update_reservation(&res).await?;

    tracing::info!(reservation_id = id, "reservation updated");
    redirect_with_flash(&session, FlashKind::Flash, "Changes saved", &source.back_url(&res)).await
}

/// POST /admin/process-reservation/{src}/{id}
pub async fn process_reservation(
    State(state): State<AppState>,
    session: Session,
    Path((src, id)): Path<(String, i32)>,
) -> AppResult<Response> {
    let source = Source::parse(&src)?;
    let res = state.repo.get_reservation_by_id(id).await?;
    state.repo.update_processed_for_reservation(id, true).await?;

    tracing::info!(reservation_id = id, "reservation processed");
    redirect_with_flash(&session, FlashKind::Flash, "Reservation marked as processed", &source.back_url(&res)).await
}

/// POST /admin/delete-reservation/{src}/{id}
pub async fn delete_reservation(
    State(state): State<AppState>,
    session: Session,
    Path((src, id)): Path<(String, i32)>,
) -> AppResult<Response> {
    let source = Source::parse(&src)?;
    let res = state.repo.get_reservation_by_id(id).await?;
    state.repo.delete_reservation(id).await?;

    tracing::info!(reservation_id = id, "reservation deleted");
    redirect_with_flash(&session, FlashKind::Flash, "Reservation deleted", &source.back_url(&res)).await
}

/// GET /admin/reservations-calendar?y=&m=
pub async fn calendar(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<Fields>,
) -> AppResult<Response> {
    let today = Utc::now().date_naive();
    let year = params
        .get("y")
        .and_then(|y| y.parse().ok())
        .unwrap_or(today.year());
    let month = params
        .get("m")
        .and_then(|m| m.parse().ok())
        .unwrap_or(today.month());

    let (first, next) = CalendarView::month_bounds(year, month)
        .or_else(|| CalendarView::month_bounds(today.year(), today.month()))
        .ok_or_else(|| AppError::Internal("current month out of range".into()))?;

    let mut rooms = Vec::new();
    for room in state.repo.all_rooms().await? {
        let restrictions = state
            .repo
            .get_restrictions_for_room_by_date(room.id, first, next)
            .await?;
        rooms.push((room, restrictions));
    }

    let td = TemplateData {
        calendar: Some(CalendarView::build(first, rooms)),
        ..TemplateData::default()
    };
    render(&state, &session, "admin-reservations-calendar.page", td).await
}

/// POST /admin/reservations-calendar
/// Blocks a room for the given nights.
pub async fn block_dates(
    State(state): State<AppState>,
    session: Session,
    Form(fields): Form<Fields>,
) -> AppResult<Response> {
    let get = |name: &str| fields.get(name).map(String::as_str).unwrap_or("");

    let (start, end) = match parse_date_range(get("start"), get("end")) {
        Ok(range) => range,
        Err(message) => {
            return redirect_with_flash(&session, FlashKind::Error, message, "/admin/reservations-calendar").await
        }
    };
    let Ok(room_id) = get("room_id").parse::<i32>() else {
        return redirect_with_flash(&session, FlashKind::Error, "invalid ID!", "/admin/reservations-calendar").await;
    };

    let room = state.repo.get_room_by_id(room_id).await?;
    state
        .repo
        .insert_room_restriction(&NewRoomRestriction {
            start_date: start,
            end_date: end,
            room_id: room.id,
            reservation_id: None,
            restriction_id: RESTRICTION_OWNER_BLOCK,
        })
        .await?;

    tracing::info!(room_id, %start, %end, "owner block added");
    session::put_flash(&session, FlashKind::Flash, format!("{} blocked", room.room_name)).await?;
    Ok(Redirect::to(&calendar_url(start)).into_response())
}
