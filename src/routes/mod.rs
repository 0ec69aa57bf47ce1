/**
 * Routes Module
 * Page, booking, admin and health handlers
 */

pub mod admin;
pub mod auth;
pub mod booking;
pub mod health;
pub mod pages;

use axum::response::{IntoResponse, Redirect, Response};
use chrono::NaiveDate;
use tower_sessions::Session;

use crate::error::AppResult;
use crate::forms::DATE_FORMAT;
use crate::render::TemplateData;
use crate::session::{self, FlashKind};
use crate::state::AppState;

pub(crate) fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

/// Parses an arrival/departure pair. The error is the message shown to the visitor.
pub(crate) fn parse_date_range(start: &str, end: &str) -> Result<(NaiveDate, NaiveDate), &'static str> {
    let start = parse_date(start).ok_or("can't parse start date!")?;
    let end = parse_date(end).ok_or("can't parse end date!")?;
    if end <= start {
        return Err("departure must be after arrival!");
    }
    Ok((start, end))
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Stores a one-shot message and answers with a 303 to `to`.
pub(crate) async fn redirect_with_flash(
    session: &Session,
    kind: FlashKind,
    message: &str,
    to: &str,
) -> AppResult<Response> {
    session::put_flash(session, kind, message).await?;
    Ok(Redirect::to(to).into_response())
}

pub(crate) async fn render(
    state: &AppState,
    session: &Session,
    page: &str,
    td: TemplateData,
) -> AppResult<Response> {
    Ok(state.renderer.render(session, page, td).await?.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_uses_day_first_layout() {
        assert_eq!(parse_date("02/01/2050"), NaiveDate::from_ymd_opt(2050, 1, 2));
        assert_eq!(parse_date("2050-01-02"), None);
        assert_eq!(parse_date("31/02/2050"), None);
    }

    #[test]
    fn test_parse_date_range_requires_end_after_start() {
        assert!(parse_date_range("01/01/2050", "02/01/2050").is_ok());
        assert_eq!(
            parse_date_range("02/01/2050", "02/01/2050"),
            Err("departure must be after arrival!")
        );
        assert_eq!(
            parse_date_range("invalid", "02/01/2050"),
            Err("can't parse start date!")
        );
        assert_eq!(
            parse_date_range("01/01/2050", ""),
            Err("can't parse end date!")
        );
    }
}
