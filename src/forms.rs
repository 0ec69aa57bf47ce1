//! Server-side validation of submitted form fields.

use std::collections::HashMap;

use regex::Regex;

/// Layout of every date typed into a form or passed in a query string
pub const DATE_FORMAT: &str = "%d/%m/%Y";

lazy_static::lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
}

/// Field name to error message. Only the first message per field is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormErrors(HashMap<String, String>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Submitted values plus the errors found while validating them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Form {
    values: HashMap<String, String>,
    pub errors: FormErrors,
}

impl Form {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self {
            values,
            errors: FormErrors::default(),
        }
    }

    /// Submitted value, or "" when absent.
    pub fn get(&self, field: &str) -> &str {
        self.values.get(field).map(String::as_str).unwrap_or("")
    }

    pub fn has(&self, field: &str) -> bool {
        !self.get(field).trim().is_empty()
    }

    pub fn required(&mut self, fields: &[&str]) {
        for field in fields {
            if !self.has(field) {
                self.errors.add(field, "This field cannot be blank");
            }
        }
    }

    pub fn min_length(&mut self, field: &str, length: usize) -> bool {
        let actual = self.get(field).chars().count();
        if actual < length {
            self.errors.add(
                field,
                format!("This field must be at least {length} characters long (currently {actual})"),
            );
            return false;
        }
        true
    }

    pub fn is_email(&mut self, field: &str) {
        if !EMAIL_REGEX.is_match(self.get(field)) {
            self.errors.add(field, "Invalid email address");
        }
    }

    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl From<HashMap<String, String>> for Form {
    fn from(values: HashMap<String, String>) -> Self {
        Self::new(values)
    }
}
