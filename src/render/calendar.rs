//! Month grid shown on the admin reservation calendar.

use chrono::{Months, NaiveDate};

use crate::db::models::{Room, RoomRestriction, RESTRICTION_OWNER_BLOCK};

/// State of one room on one night.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarCell {
    Free,
    /// Taken by the reservation with this id
    Reserved(i32),
    /// Closed by the owner
    Blocked,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomCalendar {
    pub room: Room,
    /// One cell per day of the month, in order
    pub cells: Vec<CalendarCell>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarView {
    pub first_day: NaiveDate,
    pub days: Vec<NaiveDate>,
    pub rooms: Vec<RoomCalendar>,
}

impl CalendarView {
    /// First and one-past-last day of the month, if `year`/`month` is a real month.
    pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = first.checked_add_months(Months::new(1))?;
        Some((first, next))
    }

    pub fn build(first_day: NaiveDate, rooms: Vec<(Room, Vec<RoomRestriction>)>) -> Self {
        let next_month = first_day
            .checked_add_months(Months::new(1))
            .unwrap_or(first_day);
        let days: Vec<NaiveDate> = first_day
            .iter_days()
            .take_while(|d| *d < next_month)
            .collect();

        let rooms = rooms
            .into_iter()
            .map(|(room, restrictions)| {
                let cells = days
                    .iter()
                    .map(|day| cell_for(*day, &restrictions))
                    .collect();
                RoomCalendar { room, cells }
            })
            .collect();

        Self {
            first_day,
            days,
            rooms,
        }
    }

    pub fn title(&self) -> String {
        self.first_day.format("%B %Y").to_string()
    }

    pub fn previous(&self) -> NaiveDate {
        self.first_day
            .checked_sub_months(Months::new(1))
            .unwrap_or(self.first_day)
    }

    pub fn next(&self) -> NaiveDate {
        self.first_day
            .checked_add_months(Months::new(1))
            .unwrap_or(self.first_day)
    }
}

fn cell_for(day: NaiveDate, restrictions: &[RoomRestriction]) -> CalendarCell {
    restrictions
        .iter()
        .find(|rr| rr.covers(day))
        .map(|rr| match rr.reservation_id {
            Some(id) if rr.restriction_id != RESTRICTION_OWNER_BLOCK => CalendarCell::Reserved(id),
            _ => CalendarCell::Blocked,
        })
        .unwrap_or(CalendarCell::Free)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::RESTRICTION_RESERVATION;
    use chrono::Utc;

    fn room() -> Room {
        let now = Utc::now();
        Room {
            id: 1,
            room_name: "General's Quarters".into(),
            created_at: now,
            updated_at: now,
        }
    }

    fn restriction(start: u32, end: u32, reservation_id: Option<i32>, restriction_id: i32) -> RoomRestriction {
        let now = Utc::now();
        RoomRestriction {
            id: 1,
            start_date: NaiveDate::from_ymd_opt(2050, 2, start).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2050, 2, end).unwrap(),
            room_id: 1,
            reservation_id,
            restriction_id,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_month_bounds_rejects_invalid_month() {
        assert!(CalendarView::month_bounds(2050, 13).is_none());
        let (first, next) = CalendarView::month_bounds(2050, 12).unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2050, 12, 1).unwrap());
        assert_eq!(next, NaiveDate::from_ymd_opt(2051, 1, 1).unwrap());
    }

    #[test]
    fn test_build_marks_reserved_and_blocked_nights() {
        let (first, _) = CalendarView::month_bounds(2050, 2).unwrap();
        let view = CalendarView::build(
            first,
            vec![(
                room(),
                vec![
                    restriction(3, 5, Some(7), RESTRICTION_RESERVATION),
                    restriction(10, 11, None, RESTRICTION_OWNER_BLOCK),
                ],
            )],
        );

        assert_eq!(view.days.len(), 28);
        let cells = &view.rooms[0].cells;
        assert_eq!(cells[1], CalendarCell::Free);
        assert_eq!(cells[2], CalendarCell::Reserved(7));
        assert_eq!(cells[3], CalendarCell::Reserved(7));
        // checkout day is free
        assert_eq!(cells[4], CalendarCell::Free);
        assert_eq!(cells[9], CalendarCell::Blocked);
        assert_eq!(cells[10], CalendarCell::Free);
    }

    #[test]
    fn test_navigation_crosses_year_boundary() {
        let (first, _) = CalendarView::month_bounds(2050, 1).unwrap();
        let view = CalendarView::build(first, vec![]);
        assert_eq!(view.previous(), NaiveDate::from_ymd_opt(2049, 12, 1).unwrap());
        assert_eq!(view.next(), NaiveDate::from_ymd_opt(2050, 2, 1).unwrap());
        assert_eq!(view.title(), "January 2050");
    }
}
