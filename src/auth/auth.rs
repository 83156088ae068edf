use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::response::content::RawHtml;
use rocket::response::{Flash, Redirect};
use sqlx::SqlitePool;

use crate::db::{get_session_by_token, get_user};
use crate::views::{Views, page_context};

use super::User;

pub const SESSION_COOKIE: &str = "session_token";

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let auth_span = tracing::info_span!("user_auth_guard");
        let _guard = auth_span.enter();

        let token = request
            .cookies()
            .get_private(SESSION_COOKIE)
            .map(|c| c.value().to_string());

        let Some(token) = token else {
            return Outcome::Error((Status::Unauthorized, ()));
        };

        let db = match request.rocket().state::<SqlitePool>() {
            Some(pool) => pool,
            _ => {
                tracing::error!("Database pool not found in managed state");
                return Outcome::Error((Status::InternalServerError, ()));
            }
        };

        let session = match get_session_by_token(db, &token).await {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = ?err, "Invalid session token");
                return Outcome::Error((Status::Unauthorized, ()));
            }
        };

        if !session.is_valid() {
            tracing::warn!(user_id = %session.user_id, "Session token expired");
            return Outcome::Error((Status::Unauthorized, ()));
        }

        match get_user(db, session.user_id).await {
            Ok(user) => {
                tracing::debug!(email = %user.email, role = %user.role.as_str(), "User authenticated via session token");
                Outcome::Success(user)
            }
            Err(err) => {
                tracing::error!(user_id = %session.user_id, error = ?err, "Failed to fetch user for valid session");
                Outcome::Error((Status::Unauthorized, ()))
            }
        }
    }
}

#[catch(401)]
pub fn unauthorized(req: &Request) -> Flash<Redirect> {
    tracing::warn!("Unauthenticated access to {}", req.uri());
    Flash::warning(Redirect::to("/auth/login"), "Please sign in first.")
}

#[catch(403)]
pub fn forbidden(req: &Request) -> (Status, RawHtml<String>) {
    tracing::warn!("Forbidden access attempt to {}", req.uri());
    let body = req
        .rocket()
        .state::<Views>()
        .and_then(|views| {
            views
                .render("forbidden.html", &page_context(None, None))
                .ok()
        })
        .unwrap_or_else(|| RawHtml("<h1>Access denied</h1>".to_string()));

    (Status::Forbidden, body)
}

#[catch(404)]
pub fn not_found(req: &Request) -> (Status, RawHtml<String>) {
    let body = req
        .rocket()
        .state::<Views>()
        .and_then(|views| views.render("not_found.html", &page_context(None, None)).ok())
        .unwrap_or_else(|| RawHtml("<h1>Page not found</h1>".to_string()));

    (Status::NotFound, body)
}
