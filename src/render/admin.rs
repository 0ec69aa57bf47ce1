// Admin pages
// Bodies for the back office; each one is wrapped by `layouts::admin`

use maud::{html, Markup};

use super::{calendar::CalendarCell, layouts, pages::text_field, TemplateData};
use crate::db::models::Reservation;
use crate::forms::DATE_FORMAT;

pub fn dashboard(td: &TemplateData) -> Markup {
    html! {
        p { "Welcome back, " (td.string("user_name")) "." }
        p { "There are " (td.reservations.len()) " reservations waiting to be processed." }
    }
}

fn reservations_table(reservations: &[Reservation], src: &str) -> Markup {
    html! {
        table class="table table-striped table-hover" {
            thead {
                tr {
                    th { "ID" }
                    th { "Last Name" }
                    th { "Room" }
                    th { "Arrival" }
                    th { "Departure" }
                    th { "Status" }
                }
            }
            tbody {
                @for res in reservations {
                    tr {
                        td { (res.id) }
                        td { a href={ "/admin/reservations/" (src) "/" (res.id) } { (res.last_name) } }
                        td { (res.room_name) }
                        td { (res.start_date.format(DATE_FORMAT).to_string()) }
                        td { (res.end_date.format(DATE_FORMAT).to_string()) }
                        td { @if res.processed { "Processed" } @else { "New" } }
                    }
                }
            }
        }
    }
}

pub fn new_reservations(td: &TemplateData) -> Markup {
    html! {
        @if td.reservations.is_empty() {
            p { "No new reservations." }
        } @else {
            (reservations_table(&td.reservations, "new"))
        }
    }
}

pub fn all_reservations(td: &TemplateData) -> Markup {
    reservations_table(&td.reservations, "all")
}

pub fn show_reservation(td: &TemplateData) -> Markup {
    let Some(res) = &td.reservation else {
        return html! { p { "Reservation not found." } };
    };
    let src = td.string("src");
    let back = td.string("back");
    let form = &td.form;
    let value = |field: &str, stored: &str| -> String {
        if form.has(field) {
            form.get(field).to_string()
        } else {
            stored.to_string()
        }
    };

    html! {
        p {
            strong { "Arrival: " } (res.start_date.format(DATE_FORMAT).to_string()) br;
            strong { "Departure: " } (res.end_date.format(DATE_FORMAT).to_string()) br;
            strong { "Room: " } (res.room_name)
        }
        form method="post" action={ "/admin/reservations/" (src) "/" (res.id) } novalidate {
            (layouts::csrf_field(td))
            (text_field(form, "first_name", "First Name:", &value("first_name", &res.first_name), "text"))
            (text_field(form, "last_name", "Last Name:", &value("last_name", &res.last_name), "text"))
            (text_field(form, "email", "Email:", &value("email", &res.email), "email"))
            (text_field(form, "phone", "Phone:", &value("phone", &res.phone), "text"))

            div class="d-flex gap-2" {
                button type="submit" class="btn btn-primary" { "Save" }
                a class="btn btn-warning" href=(back) { "Cancel" }
                @if !res.processed {
                    button type="submit" class="btn btn-info" formaction={ "/admin/process-reservation/" (src) "/" (res.id) } { "Mark as Processed" }
                }
                button type="submit" class="btn btn-danger ms-auto" formaction={ "/admin/delete-reservation/" (src) "/" (res.id) } { "Delete" }
            }
        }
    }
}

pub fn calendar(td: &TemplateData) -> Markup {
    let Some(view) = &td.calendar else {
        return html! {};
    };
    let prev = view.previous();
    let next = view.next();

    html! {
        div class="d-flex justify-content-between align-items-center mb-3" {
            a class="btn btn-sm btn-outline-secondary"
                href={ "/admin/reservations-calendar?y=" (prev.format("%Y").to_string()) "&m=" (prev.format("%m").to_string()) } { "<<" }
            h3 { (view.title()) }
            a class="btn btn-sm btn-outline-secondary"
                href={ "/admin/reservations-calendar?y=" (next.format("%Y").to_string()) "&m=" (next.format("%m").to_string()) } { ">>" }
        }

        @for room in &view.rooms {
            h4 class="mt-4" { (room.room.room_name) }
            div class="table-responsive" {
                table class="table table-bordered table-sm calendar" {
                    tr class="table-dark" {
                        @for day in &view.days {
                            td class="text-center" { (day.format("%d").to_string()) }
                        }
                    }
                    tr {
                        @for cell in &room.cells {
                            @match cell {
                                CalendarCell::Reserved(id) => {
                                    td class="text-center bg-danger" {
                                        a class="text-white" href={ "/admin/reservations/cal/" (id) } { "R" }
                                    }
                                },
                                CalendarCell::Blocked => {
                                    td class="text-center bg-secondary text-white" { "B" }
                                },
                                CalendarCell::Free => {
                                    td {}
                                },
                            }
                        }
                    }
                }
            }
        }

        h4 class="mt-5" { "Block dates" }
        form method="post" action="/admin/reservations-calendar" class="row g-2" {
            (layouts::csrf_field(td))
            div class="col-md-4" {
                select name="room_id" class="form-select" {
                    @for room in &view.rooms {
                        option value=(room.room.id) { (room.room.room_name) }
                    }
                }
            }
            div class="col-md-3" {
                input type="text" name="start" class="form-control" placeholder="dd/mm/yyyy" autocomplete="off";
            }
            div class="col-md-3" {
                input type="text" name="end" class="form-control" placeholder="dd/mm/yyyy" autocomplete="off";
            }
            div class="col-md-2" {
                button type="submit" class="btn btn-secondary w-100" { "Block" }
            }
        }
    }
}
