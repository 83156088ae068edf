use rocket::State;
use rocket::request::FlashMessage;
use rocket::serde::json::{Json, Value, json};
use sqlx::SqlitePool;

use super::{Page, normalize_section};
use crate::auth::{Permission, User};
use crate::db::{all_tasks, dashboard_counts};
use crate::progress::{ALL_SECTIONS, section_options};
use crate::views::{Views, page_context};

#[get("/")]
pub fn index(user: Option<User>, flash: Option<FlashMessage<'_>>, views: &State<Views>) -> Page {
    views.render("index.html", &page_context(user.as_ref(), flash))
}

#[get("/health")]
pub async fn health(db: &State<SqlitePool>) -> Json<Value> {
    let database = sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(db.inner())
        .await
        .is_ok();

    Json(json!({
        "status": if database { "ok" } else { "degraded" },
        "database": database,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[get("/dashboard")]
pub async fn dashboard(
    user: User,
    flash: Option<FlashMessage<'_>>,
    db: &State<SqlitePool>,
    views: &State<Views>,
) -> Page {
    user.require_permission(Permission::ViewDashboard)?;

    let counts = dashboard_counts(db.inner(), &user).await?;

    let mut context = page_context(Some(&user), flash);
    context.insert("counts", &counts);
    views.render("dashboard.html", &context)
}

#[get("/knowledge-base?<section>")]
pub async fn knowledge_base(
    section: Option<String>,
    user: User,
    flash: Option<FlashMessage<'_>>,
    db: &State<SqlitePool>,
    views: &State<Views>,
) -> Page {
    user.require_permission(Permission::ViewKnowledgeBase)?;

    let tasks = all_tasks(db.inner()).await?;
    let sections = section_options(&tasks);

    let requested = normalize_section(section.as_deref());
    let selected = match requested {
        Some(code) if code == ALL_SECTIONS => code,
        Some(code) if sections.iter().any(|s| s.code == code) => code,
        _ => sections
            .first()
            .map(|s| s.code.clone())
            .unwrap_or_else(|| ALL_SECTIONS.to_string()),
    };

    let visible: Vec<_> = tasks
        .iter()
        .filter(|task| selected == ALL_SECTIONS || task.section_code == selected)
        .collect();

    let mut context = page_context(Some(&user), flash);
    context.insert("sections", &sections);
    context.insert("selected_section", &selected);
    context.insert("tasks", &visible);
    context.insert("total_count", &tasks.len());
    context.insert("visible_count", &visible.len());
    views.render("knowledge_base.html", &context)
}
