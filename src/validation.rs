use std::borrow::Cow;

use chrono::NaiveDate;
use rocket::FromForm;
use serde::Serialize;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::auth::Role;

fn error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

pub fn no_whitespace(value: &str) -> Result<(), ValidationError> {
    if value.chars().any(char::is_whitespace) {
        return Err(error(
            "whitespace",
            "Password must not contain whitespace.",
        ));
    }
    Ok(())
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(error("blank", "Enter your full name."));
    }
    Ok(())
}

fn known_role(value: &str) -> Result<(), ValidationError> {
    Role::from_str(value.trim())
        .map(|_| ())
        .map_err(|_| error("role", "Choose a valid role."))
}

/// Field-ordered messages for forms that render their errors inline.
pub trait FormValidateExt: Validate {
    const FIELD_ORDER: &'static [&'static str];

    fn validation_messages(&self) -> Result<(), Vec<String>> {
        match self.validate() {
            Ok(()) => Ok(()),
            Err(errors) => Err(error_messages(&errors, Self::FIELD_ORDER)),
        }
    }
}

pub fn error_messages(errors: &ValidationErrors, field_order: &[&str]) -> Vec<String> {
    let by_field = errors.field_errors();
    let mut messages = Vec::new();

    for field in field_order {
        let Some(field_errors) = by_field.get(*field) else {
            continue;
        };
        for error in field_errors.iter() {
            let message = error
                .message
                .clone()
                .unwrap_or_else(|| Cow::Owned(format!("Invalid value for {}.", field)))
                .to_string();
            if !messages.contains(&message) {
                messages.push(message);
            }
        }
    }

    messages
}

#[derive(Debug, Clone, FromForm, Validate)]
pub struct RegisterForm {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(custom(function = "not_blank"))]
    pub full_name: String,
    #[validate(custom(function = "known_role"))]
    pub role: String,
    #[validate(
        length(min = 8, message = "Password must be at least 8 characters."),
        custom(function = "no_whitespace")
    )]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match."))]
    pub password_confirm: String,
}

impl FormValidateExt for RegisterForm {
    const FIELD_ORDER: &'static [&'static str] =
        &["email", "full_name", "role", "password", "password_confirm"];
}

impl RegisterForm {
    pub fn normalized(mut self) -> Self {
        self.email = self.email.trim().to_lowercase();
        self.full_name = self.full_name.trim().to_string();
        self.role = self.role.trim().to_lowercase();
        self
    }
}

#[derive(Debug, Clone, FromForm, Validate)]
pub struct LoginForm {
    pub email: String,
    #[validate(
        length(min = 8, message = "Password must be at least 8 characters."),
        custom(function = "no_whitespace")
    )]
    pub password: String,
}

impl FormValidateExt for LoginForm {
    const FIELD_ORDER: &'static [&'static str] = &["email", "password"];
}

/// Submitted values echoed back into a form after a failed attempt.
#[derive(Debug, Default, Clone, Serialize)]
pub struct FormEcho {
    pub email: String,
    pub full_name: String,
    pub role: String,
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

pub fn optional_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Parses a score and checks it against `0..=max_score`.
pub fn parse_score(raw: &str, max_score: i64) -> Option<i64> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|score| (0..=max_score).contains(score))
}
