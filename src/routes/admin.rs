use rocket::State;
use rocket::request::FlashMessage;
use sqlx::SqlitePool;

use super::Page;
use crate::auth::{Permission, User};
use crate::db::{list_users, recent_audit};
use crate::views::{Views, page_context};

const AUDIT_LIMIT: i64 = 200;

#[get("/history")]
pub async fn history(
    user: User,
    flash: Option<FlashMessage<'_>>,
    db: &State<SqlitePool>,
    views: &State<Views>,
) -> Page {
    user.require_permission(Permission::ViewAuditLog)?;

    let entries = recent_audit(db.inner(), AUDIT_LIMIT).await?;

    let mut context = page_context(Some(&user), flash);
    context.insert("entries", &entries);
    views.render("history.html", &context)
}

#[get("/admin/users")]
pub async fn users(
    user: User,
    flash: Option<FlashMessage<'_>>,
    db: &State<SqlitePool>,
    views: &State<Views>,
) -> Page {
    user.require_permission(Permission::ViewUsers)?;

    let users = list_users(db.inner()).await?;

    let mut context = page_context(Some(&user), flash);
    context.insert("users", &users);
    views.render("admin/users.html", &context)
}
