use rocket::State;
use rocket::form::Form;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::request::FlashMessage;
use rocket::response::Redirect;
use rocket::response::status::Custom;
use sqlx::SqlitePool;
use tracing::info;

use super::{FormResponse, Page, success};
use crate::auth::{Role, SESSION_COOKIE, User};
use crate::db::{
    authenticate_user, clean_expired_sessions, create_user, create_user_session,
    invalidate_session, log_action,
};
use crate::env::Settings;
use crate::error::AppError;
use crate::validation::{FormEcho, FormValidateExt, LoginForm, RegisterForm};
use crate::views::{Views, page_context};

fn render_form(
    views: &Views,
    template: &str,
    user: Option<&User>,
    flash: Option<FlashMessage<'_>>,
    errors: &[String],
    echo: &FormEcho,
) -> Page {
    let mut context = page_context(user, flash);
    context.insert("errors", errors);
    context.insert("form", echo);
    views.render(template, &context)
}

fn invalid(
    views: &Views,
    template: &str,
    errors: &[String],
    echo: &FormEcho,
) -> Result<FormResponse, AppError> {
    let body = render_form(views, template, None, None, errors, echo)?;
    Ok(FormResponse::Invalid(Custom(Status::BadRequest, body)))
}

#[get("/register")]
pub fn register_page(
    user: Option<User>,
    flash: Option<FlashMessage<'_>>,
    views: &State<Views>,
) -> Page {
    render_form(
        views,
        "auth/register.html",
        user.as_ref(),
        flash,
        &[],
        &FormEcho::default(),
    )
}

#[post("/register", data = "<form>")]
pub async fn register(
    form: Form<RegisterForm>,
    db: &State<SqlitePool>,
    views: &State<Views>,
) -> Result<FormResponse, AppError> {
    let form = form.into_inner().normalized();
    let echo = FormEcho {
        email: form.email.clone(),
        full_name: form.full_name.clone(),
        role: form.role.clone(),
    };

    if let Err(errors) = form.validation_messages() {
        return invalid(views, "auth/register.html", &errors, &echo);
    }

    let role = Role::from_str(&form.role)?;
    let mut tx = db.begin().await?;

    let user_id = match create_user(&mut *tx, &form.email, &form.full_name, role, &form.password)
        .await
    {
        Ok(id) => id,
        Err(AppError::Conflict(_)) => {
            let errors = ["This email is already registered. Please sign in.".to_string()];
            return invalid(views, "auth/register.html", &errors, &echo);
        }
        Err(e) => return Err(e),
    };

    log_action(
        &mut *tx,
        Some(user_id),
        "register_user",
        &format!("Registered {} as {}", form.email, role.as_str()),
    )
    .await?;
    tx.commit().await?;

    info!(user_id, "User registered");
    Ok(FormResponse::Flash(success(
        "/auth/login",
        "Registration complete. Please sign in.",
    )))
}

#[get("/login")]
pub fn login_page(
    user: Option<User>,
    flash: Option<FlashMessage<'_>>,
    views: &State<Views>,
) -> Page {
    render_form(
        views,
        "auth/login.html",
        user.as_ref(),
        flash,
        &[],
        &FormEcho::default(),
    )
}

#[post("/login", data = "<form>")]
pub async fn login(
    form: Form<LoginForm>,
    cookies: &CookieJar<'_>,
    db: &State<SqlitePool>,
    views: &State<Views>,
    settings: &State<Settings>,
) -> Result<FormResponse, AppError> {
    let email = form.email.trim().to_lowercase();
    let echo = FormEcho {
        email: email.clone(),
        ..FormEcho::default()
    };

    if let Err(errors) = form.validation_messages() {
        return invalid(views, "auth/login.html", &errors, &echo);
    }

    let Some(user) = authenticate_user(db.inner(), &email, &form.password).await? else {
        let errors = ["Invalid email or password.".to_string()];
        return invalid(views, "auth/login.html", &errors, &echo);
    };

    clean_expired_sessions(db.inner()).await?;
    let session = create_user_session(db.inner(), user.id, settings.session_hours).await?;

    cookies.add_private(
        Cookie::build((SESSION_COOKIE, session.token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    );

    info!(user_id = user.id, "User signed in");
    Ok(FormResponse::Redirect(Redirect::to("/dashboard")))
}

#[post("/logout")]
pub async fn logout(cookies: &CookieJar<'_>, db: &State<SqlitePool>) -> FormResponse {
    if let Some(cookie) = cookies.get_private(SESSION_COOKIE) {
        if let Err(e) = invalidate_session(db.inner(), cookie.value()).await {
            e.log_and_record("Logout");
        }
    }
    cookies.remove_private(Cookie::build(SESSION_COOKIE).path("/"));

    FormResponse::Flash(success("/", "You have been signed out."))
}
