use rocket::State;
use rocket::form::Form;
use rocket::request::FlashMessage;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use super::{Action, Page, failure, flash_error, success, visible_children};
use crate::auth::{Permission, Role, User};
use crate::db::{
    assign_parent, assign_therapist, create_child, get_child, get_user, list_parent_links,
    list_therapist_links, list_users_by_role, log_action,
};
use crate::error::AppError;
use crate::models::{AssignmentLink, Child};
use crate::validation::{optional_text, parse_date};
use crate::views::{Views, page_context};

#[derive(Serialize)]
struct ChildRow<'a> {
    child: &'a Child,
    therapists: Vec<&'a AssignmentLink>,
    parents: Vec<&'a AssignmentLink>,
}

fn links_for(links: &[AssignmentLink], child_id: i64) -> Vec<&AssignmentLink> {
    links.iter().filter(|link| link.child_id == child_id).collect()
}

#[get("/children")]
pub async fn children_page(
    user: User,
    flash: Option<FlashMessage<'_>>,
    db: &State<SqlitePool>,
    views: &State<Views>,
) -> Page {
    user.require_permission(Permission::ViewChildren)?;

    let children = visible_children(db.inner(), &user).await?;
    let mut context = page_context(Some(&user), flash);

    if user.has_permission(Permission::ViewAllChildren) {
        let therapist_links = list_therapist_links(db.inner()).await?;
        let parent_links = list_parent_links(db.inner()).await?;
        let rows: Vec<ChildRow> = children
            .iter()
            .map(|child| ChildRow {
                child,
                therapists: links_for(&therapist_links, child.id),
                parents: links_for(&parent_links, child.id),
            })
            .collect();

        context.insert("rows", &rows);
        context.insert(
            "therapists",
            &list_users_by_role(db.inner(), Role::Therapist).await?,
        );
        context.insert("parents", &list_users_by_role(db.inner(), Role::Parent).await?);
        context.insert("can_manage", &true);
    } else {
        let rows: Vec<ChildRow> = children
            .iter()
            .map(|child| ChildRow {
                child,
                therapists: Vec::new(),
                parents: Vec::new(),
            })
            .collect();
        context.insert("rows", &rows);
        context.insert("can_manage", &false);
    }

    views.render("children.html", &context)
}

#[derive(Debug, FromForm)]
pub struct ChildForm {
    pub full_name: String,
    pub birth_date: Option<String>,
    pub notes: Option<String>,
}

#[post("/children", data = "<form>")]
pub async fn create_child_action(
    form: Form<ChildForm>,
    user: User,
    db: &State<SqlitePool>,
) -> Action {
    user.require_permission(Permission::ManageChildren)?;

    let full_name = form.full_name.trim();
    if full_name.is_empty() {
        return Ok(failure("/children", "Enter the child's full name."));
    }

    let birth_date = match optional_text(form.birth_date.as_deref()) {
        None => None,
        Some(raw) => match parse_date(&raw) {
            Some(date) => Some(date),
            None => return Ok(failure("/children", "Birth date must be YYYY-MM-DD.")),
        },
    };
    let notes = optional_text(form.notes.as_deref());

    let mut tx = db.begin().await?;
    let child_id = create_child(
        &mut *tx,
        full_name,
        birth_date,
        notes.as_deref(),
        Some(user.id),
    )
    .await?;
    log_action(
        &mut *tx,
        Some(user.id),
        "create_child",
        &format!("Created child {} ({})", child_id, full_name),
    )
    .await?;
    tx.commit().await?;

    info!(child_id, "Child created");
    Ok(success("/children", format!("Added {}.", full_name)))
}

#[derive(Debug, FromForm)]
pub struct AssignForm {
    pub user_id: i64,
}

async fn assign(
    db: &SqlitePool,
    admin: &User,
    child_id: i64,
    target_id: i64,
    role: Role,
) -> Result<bool, AppError> {
    let mut tx = db.begin().await?;

    let child = get_child(&mut *tx, child_id).await?;
    let target = get_user(&mut *tx, target_id).await?;
    if target.role != role {
        return Err(AppError::Validation(format!(
            "{} is not a {}.",
            target.full_name,
            role.label().to_lowercase()
        )));
    }

    let created = match role {
        Role::Parent => assign_parent(&mut *tx, child.id, target.id).await?,
        _ => assign_therapist(&mut *tx, child.id, target.id).await?,
    };

    if created {
        log_action(
            &mut *tx,
            Some(admin.id),
            &format!("assign_{}", role.as_str()),
            &format!(
                "Assigned {} {} to child {}",
                role.as_str(),
                target.email,
                child.id
            ),
        )
        .await?;
    }
    tx.commit().await?;

    Ok(created)
}

async fn assign_action(
    db: &SqlitePool,
    user: &User,
    child_id: i64,
    target_id: i64,
    role: Role,
) -> Action {
    user.require_permission(Permission::AssignCaregivers)?;

    match assign(db, user, child_id, target_id, role).await {
        Ok(true) => Ok(success("/children", format!("{} assigned.", role.label()))),
        Ok(false) => Ok(success(
            "/children",
            format!("{} was already assigned.", role.label()),
        )),
        Err(e) => flash_error(e, "/children"),
    }
}

#[post("/children/<child_id>/assign-therapist", data = "<form>")]
pub async fn assign_therapist_action(
    child_id: i64,
    form: Form<AssignForm>,
    user: User,
    db: &State<SqlitePool>,
) -> Action {
    assign_action(db.inner(), &user, child_id, form.user_id, Role::Therapist).await
}

#[post("/children/<child_id>/assign-parent", data = "<form>")]
pub async fn assign_parent_action(
    child_id: i64,
    form: Form<AssignForm>,
    user: User,
    db: &State<SqlitePool>,
) -> Action {
    assign_action(db.inner(), &user, child_id, form.user_id, Role::Parent).await
}
