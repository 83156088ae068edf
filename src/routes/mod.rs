use rocket::Responder;
use rocket::response::content::RawHtml;
use rocket::response::status::Custom;
use rocket::response::{Flash, Redirect};
use sqlx::SqlitePool;

use crate::auth::{Role, User};
use crate::db::{children_for_parent, children_for_therapist, list_children};
use crate::error::AppError;
use crate::models::Child;

pub mod admin;
pub mod assessments;
pub mod auth;
pub mod children;
pub mod edit_requests;
pub mod pages;
pub mod reports;

pub type Page = Result<RawHtml<String>, AppError>;
pub type Action = Result<Flash<Redirect>, AppError>;

pub const RECENT_LIMIT: usize = 80;

/// Outcome of a form post that either moves on or re-renders the form.
#[derive(Responder)]
pub enum FormResponse {
    Redirect(Redirect),
    Flash(Flash<Redirect>),
    Invalid(Custom<RawHtml<String>>),
}

pub fn success(url: impl Into<String>, message: impl Into<String>) -> Flash<Redirect> {
    Flash::success(Redirect::to(url.into()), message.into())
}

pub fn failure(url: impl Into<String>, message: impl Into<String>) -> Flash<Redirect> {
    Flash::error(Redirect::to(url.into()), message.into())
}

/// Turns user-facing errors into a flash on `url`; anything else propagates.
pub fn flash_error(err: AppError, url: impl Into<String>) -> Action {
    match err {
        AppError::Validation(message)
        | AppError::Conflict(message)
        | AppError::NotFound(message) => {
            tracing::warn!(message = %message, "Rejected form submission");
            Ok(failure(url, message))
        }
        other => Err(other),
    }
}

/// Children the user may see: all for administrators, assigned ones otherwise.
pub async fn visible_children(db: &SqlitePool, user: &User) -> Result<Vec<Child>, AppError> {
    match user.role {
        Role::Admin => list_children(db).await,
        Role::Therapist => children_for_therapist(db, user.id).await,
        Role::Parent => children_for_parent(db, user.id).await,
    }
}

/// The requested child when visible, else the first visible one.
pub fn select_child(children: &[Child], requested: Option<i64>) -> Option<&Child> {
    requested
        .and_then(|id| children.iter().find(|child| child.id == id))
        .or_else(|| children.first())
}

pub fn normalize_section(raw: Option<&str>) -> Option<String> {
    raw.map(|s| s.trim().to_uppercase()).filter(|s| !s.is_empty())
}
