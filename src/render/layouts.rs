// Layouts
// Page chrome shared by the public site and the admin area

use maud::{html, Markup, PreEscaped, DOCTYPE};

use super::TemplateData;

fn head(title: &str) -> Markup {
    html! {
        head {
            meta charset="utf-8";
            meta name="viewport" content="width=device-width, initial-scale=1, shrink-to-fit=no";
            title { (title) " | Fort Smythe Bed and Breakfast" }
            link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/css/bootstrap.min.css";
            link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/vanillajs-datepicker@1.3.4/dist/css/datepicker-bs5.min.css";
            link rel="stylesheet" href="/static/css/styles.css";
        }
    }
}

/// Flash, error and warning banners popped from the session.
fn messages(td: &TemplateData) -> Markup {
    html! {
        @if let Some(flash) = &td.flash {
            div class="alert alert-success" role="alert" { (flash) }
        }
        @if let Some(error) = &td.error {
            div class="alert alert-danger" role="alert" { (error) }
        }
        @if let Some(warning) = &td.warning {
            div class="alert alert-warning" role="alert" { (warning) }
        }
    }
}

/// Public site layout
pub fn base(title: &str, td: &TemplateData, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            (head(title))
            body {
                nav class="navbar navbar-expand-lg navbar-dark bg-dark" {
                    div class="container-fluid" {
                        a class="navbar-brand" href="/" { "Fort Smythe" }
                        ul class="navbar-nav me-auto" {
                            li class="nav-item" { a class="nav-link" href="/" { "Home" } }
                            li class="nav-item" { a class="nav-link" href="/about" { "About" } }
                            li class="nav-item dropdown" {
                                a class="nav-link dropdown-toggle" href="#" data-bs-toggle="dropdown" { "Rooms" }
                                ul class="dropdown-menu" {
                                    li { a class="dropdown-item" href="/generals-quarters" { "General's Quarters" } }
                                    li { a class="dropdown-item" href="/majors-suite" { "Major's Suite" } }
                                }
                            }
                            li class="nav-item" { a class="nav-link" href="/search-availability" { "Book Now" } }
                            li class="nav-item" { a class="nav-link" href="/contact" { "Contact" } }
                        }
                        ul class="navbar-nav" {
                            @if td.is_authenticated {
                                li class="nav-item" { a class="nav-link" href="/admin/dashboard" { "Admin" } }
                                li class="nav-item" { a class="nav-link" href="/user/logout" { "Logout" } }
                            } @else {
                                li class="nav-item" { a class="nav-link" href="/user/login" { "Login" } }
                            }
                        }
                    }
                }
                div class="container mt-3" {
                    (messages(td))
                }
                (content)
                footer class="footer mt-5 py-3 bg-light" {
                    div class="container text-center" {
                        strong { "Fort Smythe Bed & Breakfast" }
                        br;
                        "100 Rocky Road, Northbrook, Ontario"
                    }
                }
                script src="https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/js/bootstrap.bundle.min.js" {}
                script src="https://cdn.jsdelivr.net/npm/vanillajs-datepicker@1.3.4/dist/js/datepicker-full.min.js" {}
                script { (PreEscaped(DATEPICKER_JS)) }
            }
        }
    }
}

/// Admin area layout
pub fn admin(title: &str, td: &TemplateData, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            (head(title))
            body class="admin" {
                div class="container-fluid" {
                    div class="row" {
                        nav class="col-md-2 bg-light sidebar py-3" {
                            ul class="nav flex-column" {
                                li class="nav-item" { a class="nav-link" href="/admin/dashboard" { "Dashboard" } }
                                li class="nav-item" { a class="nav-link" href="/admin/reservations-new" { "New Reservations" } }
                                li class="nav-item" { a class="nav-link" href="/admin/reservations-all" { "All Reservations" } }
                                li class="nav-item" { a class="nav-link" href="/admin/reservations-calendar" { "Reservation Calendar" } }
                                li class="nav-item mt-3" { a class="nav-link" href="/" { "Public Site" } }
                                li class="nav-item" { a class="nav-link" href="/user/logout" { "Logout" } }
                            }
                        }
                        main class="col-md-10 py-3" {
                            h2 { (title) }
                            (messages(td))
                            (content)
                        }
                    }
                }
                script src="https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/js/bootstrap.bundle.min.js" {}
            }
        }
    }
}

/// Hidden input carrying the session's CSRF token
pub fn csrf_field(td: &TemplateData) -> Markup {
    html! {
        input type="hidden" name="csrf_token" value=(td.csrf_token);
    }
}

const DATEPICKER_JS: &str = r#"
document.querySelectorAll('[data-daterange]').forEach(function (el) {
  new DateRangePicker(el, { format: 'dd/mm/yyyy', minDate: new Date() });
});
"#;
