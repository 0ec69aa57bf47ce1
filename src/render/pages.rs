// Public pages
// Bodies for the guest-facing site; each one is wrapped by `layouts::base`

use maud::{html, Markup, PreEscaped};

use super::{admin, layouts, LayoutFn, PageFn, PageTemplate, TemplateData};
use crate::forms::Form;

/// Every page the renderer knows about
pub fn registered() -> Vec<(&'static str, PageTemplate)> {
    let base: LayoutFn = layouts::base;
    let admin_layout: LayoutFn = layouts::admin;

    vec![
        ("home.page", page("Home", base, home)),
        ("about.page", page("About", base, about)),
        ("generals.page", page("General's Quarters", base, generals)),
        ("majors.page", page("Major's Suite", base, majors)),
        ("contact.page", page("Contact", base, contact)),
        ("search-availability.page", page("Search for Availability", base, search_availability)),
        ("choose-room.page", page("Choose a Room", base, choose_room)),
        ("make-reservation.page", page("Make Reservation", base, make_reservation)),
        ("reservation-summary.page", page("Reservation Summary", base, reservation_summary)),
        ("login.page", page("Login", base, login)),
        ("admin-dashboard.page", page("Dashboard", admin_layout, admin::dashboard)),
        ("admin-new-reservations.page", page("New Reservations", admin_layout, admin::new_reservations)),
        ("admin-all-reservations.page", page("All Reservations", admin_layout, admin::all_reservations)),
        ("admin-reservations-show.page", page("Reservation", admin_layout, admin::show_reservation)),
        ("admin-reservations-calendar.page", page("Reservation Calendar", admin_layout, admin::calendar)),
    ]
}

fn page(title: &'static str, layout: LayoutFn, body: PageFn) -> PageTemplate {
    PageTemplate {
        title,
        layout,
        body,
    }
}

/// Label, input and inline error for one text field.
pub(super) fn text_field(form: &Form, name: &str, label: &str, value: &str, input_type: &str) -> Markup {
    let error = form.errors.get(name);
    html! {
        div class="mb-3" {
            label class="form-label" for=(name) { (label) }
            input.form-control.is-invalid[error.is_some()]
                type=(input_type) id=(name) name=(name) value=(value) autocomplete="off";
            @if let Some(message) = error {
                div class="invalid-feedback" { (message) }
            }
        }
    }
}

/// Start/end pickers used by both availability searches.
fn date_range_inputs() -> Markup {
    html! {
        div class="row" data-daterange="true" {
            div class="col" {
                input type="text" name="start" class="form-control" placeholder="Arrival" autocomplete="off";
            }
            div class="col" {
                input type="text" name="end" class="form-control" placeholder="Departure" autocomplete="off";
            }
        }
    }
}

fn home(_td: &TemplateData) -> Markup {
    html! {
        div class="container" {
            div class="row" {
                div class="col text-center mt-4" {
                    h1 { "Welcome to Fort Smythe Bed and Breakfast" }
                    p class="lead" {
                        "Your home away from home, set on the majestic waters of the Atlantic Ocean, "
                        "this will be a vacation to remember."
                    }
                    a class="btn btn-success" href="/search-availability" { "Make Reservation Now" }
                }
            }
        }
    }
}

fn about(_td: &TemplateData) -> Markup {
    html! {
        div class="container" {
            h1 class="mt-4" { "About" }
            p {
                "Fort Smythe is a small bed and breakfast with two rooms, "
                "run by the same family since it opened."
            }
        }
    }
}

fn room_page(td: &TemplateData, heading: &str, room_id: i32, blurb: &str) -> Markup {
    html! {
        div class="container" {
            h1 class="mt-4 text-center" { (heading) }
            p { (blurb) }
            form action="/search-availability-json" method="post" class="room-check" data-room-id=(room_id) {
                (layouts::csrf_field(td))
                input type="hidden" name="room_id" value=(room_id);
                (date_range_inputs())
                button type="submit" class="btn btn-success mt-3" { "Check Availability" }
            }
            div class="room-check-result mt-3" {}
        }
        script { (PreEscaped(ROOM_CHECK_JS)) }
    }
}

/// Submits the room form in the background and links to `/book-room` when the dates are free.
const ROOM_CHECK_JS: &str = r#"
document.querySelectorAll('form.room-check').forEach(function (form) {
  var result = form.parentElement.querySelector('.room-check-result');
  form.addEventListener('submit', function (event) {
    event.preventDefault();
    var data = new FormData(form);
    fetch(form.action, {
      method: 'POST',
      headers: { 'X-CSRF-Token': data.get('csrf_token') },
      body: new URLSearchParams(data),
    })
      .then(function (response) { return response.json(); })
      .then(function (data) {
        result.textContent = '';
        if (data.ok) {
          var link = document.createElement('a');
          link.className = 'btn btn-primary';
          link.textContent = 'Book now!';
          link.href = '/book-room?id=' + encodeURIComponent(data.room_id) +
            '&s=' + encodeURIComponent(data.start_date) +
            '&e=' + encodeURIComponent(data.end_date);
          result.appendChild(link);
        } else {
          result.textContent = data.message || 'Not available for those dates';
        }
      })
      .catch(function () {
        result.textContent = 'Please enter a valid arrival and departure date';
      });
  });
});
"#;

fn generals(td: &TemplateData) -> Markup {
    room_page(
        td,
        "General's Quarters",
        1,
        "Spacious quarters with a view of the bay, a writing desk and a private bath.",
    )
}

fn majors(td: &TemplateData) -> Markup {
    room_page(
        td,
        "Major's Suite",
        2,
        "A bright suite on the top floor with a sitting room and a balcony.",
    )
}

fn contact(_td: &TemplateData) -> Markup {
    html! {
        div class="container" {
            h1 class="mt-4" { "Contact" }
            p { "100 Rocky Road, Northbrook, Ontario" }
            p { "Phone: 555-555-5555" }
        }
    }
}

fn search_availability(td: &TemplateData) -> Markup {
    html! {
        div class="container" {
            div class="row" {
                div class="col-md-6 offset-md-3" {
                    h1 class="mt-4" { "Search for Availability" }
                    form action="/search-availability" method="post" novalidate {
                        (layouts::csrf_field(td))
                        (date_range_inputs())
                        button type="submit" class="btn btn-primary mt-3" { "Search Availability" }
                    }
                }
            }
        }
    }
}

fn choose_room(td: &TemplateData) -> Markup {
    html! {
        div class="container" {
            h1 class="mt-4" { "Choose a Room" }
            ul {
                @for room in &td.rooms {
                    li { a href={ "/choose-room/" (room.id) } { (room.room_name) } }
                }
            }
        }
    }
}

fn make_reservation(td: &TemplateData) -> Markup {
    let form = &td.form;
    let draft = td.draft.as_ref();
    let value = |field: &str, from_draft: Option<&str>| -> String {
        if form.has(field) {
            form.get(field).to_string()
        } else {
            from_draft.unwrap_or_default().to_string()
        }
    };

    html! {
        div class="container" {
            h1 class="mt-4" { "Make Reservation" }
            @if let Some(draft) = draft {
                p {
                    strong { "Reservation Details" } br;
                    "Room: " (draft.room_name) br;
                    "Arrival: " (td.string("start_date")) br;
                    "Departure: " (td.string("end_date"))
                }
            }
            form method="post" action="/make-reservation" novalidate {
                (layouts::csrf_field(td))
                input type="hidden" name="start_date" value=(td.string("start_date"));
                input type="hidden" name="end_date" value=(td.string("end_date"));
                input type="hidden" name="room_id"
                    value=(draft.and_then(|d| d.room_id).map(|id| id.to_string()).unwrap_or_default());

                (text_field(form, "first_name", "First Name:", &value("first_name", draft.map(|d| d.first_name.as_str())), "text"))
                (text_field(form, "last_name", "Last Name:", &value("last_name", draft.map(|d| d.last_name.as_str())), "text"))
                (text_field(form, "email", "Email:", &value("email", draft.map(|d| d.email.as_str())), "email"))
                (text_field(form, "phone", "Phone:", &value("phone", draft.map(|d| d.phone.as_str())), "text"))

                button type="submit" class="btn btn-primary" { "Make Reservation" }
            }
        }
    }
}

fn reservation_summary(td: &TemplateData) -> Markup {
    html! {
        div class="container" {
            h1 class="mt-4" { "Reservation Summary" }
            @if let Some(draft) = &td.draft {
                table class="table table-striped" {
                    tbody {
                        tr { td { "Name:" } td { (draft.first_name) " " (draft.last_name) } }
                        tr { td { "Room:" } td { (draft.room_name) } }
                        tr { td { "Arrival:" } td { (td.string("start_date")) } }
                        tr { td { "Departure:" } td { (td.string("end_date")) } }
                        tr { td { "Email:" } td { (draft.email) } }
                        tr { td { "Phone:" } td { (draft.phone) } }
                    }
                }
            }
        }
    }
}

fn login(td: &TemplateData) -> Markup {
    let form = &td.form;
    html! {
        div class="container" {
            div class="row" {
                div class="col-md-6 offset-md-3" {
                    h1 class="mt-4" { "Login" }
                    form method="post" action="/user/login" novalidate {
                        (layouts::csrf_field(td))
                        (text_field(form, "email", "Email:", form.get("email"), "email"))
                        (text_field(form, "password", "Password:", "", "password"))
                        button type="submit" class="btn btn-primary" { "Login" }
                    }
                }
            }
        }
    }
}
