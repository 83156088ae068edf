use std::collections::HashMap;

use rocket::State;
use rocket::form::Form;
use rocket::request::FlashMessage;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use super::{Action, Page, failure, flash_error, normalize_section, select_child, success, visible_children};
use crate::auth::{Permission, User};
use crate::db::{
    all_tasks, approve_edit_request, assessments_for_child, get_task, has_assessment,
    has_pending_request, insert_edit_request, is_assigned_therapist, list_children,
    list_edit_requests, list_requests_for_therapist, list_users, log_action,
    reject_edit_request,
};
use crate::error::AppError;
use crate::models::{Assessment, EditRequest, NewEditRequest, SkillTask};
use crate::progress::{latest_assessment_by_skill, normalize_skill_code, section_options};
use crate::validation::{optional_text, parse_date, parse_score};
use crate::views::{Views, page_context};

const REVIEW_URL: &str = "/admin/edit-requests";

fn requests_url(child_id: i64, section: Option<&str>) -> String {
    match section {
        Some(section) => format!("/requests?child_id={}&section={}", child_id, section),
        None => format!("/requests?child_id={}", child_id),
    }
}

#[derive(Serialize)]
struct SkillOption<'a> {
    task: &'a SkillTask,
    latest: Option<&'a Assessment>,
}

#[derive(Serialize)]
struct RequestRow<'a> {
    request: &'a EditRequest,
    child_name: &'a str,
    therapist_name: &'a str,
    max_score: Option<i64>,
    objective: Option<&'a str>,
}

#[get("/requests?<section>&<child_id>&<skill_code>")]
pub async fn requests_page(
    section: Option<String>,
    child_id: Option<i64>,
    skill_code: Option<String>,
    user: User,
    flash: Option<FlashMessage<'_>>,
    db: &State<SqlitePool>,
    views: &State<Views>,
) -> Page {
    user.require_permission(Permission::RequestEdits)?;

    let children = visible_children(db.inner(), &user).await?;
    let child = select_child(&children, child_id);

    let tasks = all_tasks(db.inner()).await?;
    let sections = section_options(&tasks);
    let selected_section = normalize_section(section.as_deref())
        .filter(|code| sections.iter().any(|s| &s.code == code))
        .or_else(|| sections.first().map(|s| s.code.clone()));

    let history = match child {
        Some(child) => assessments_for_child(db.inner(), child.id).await?,
        None => Vec::new(),
    };
    let latest = latest_assessment_by_skill(&history);

    let skills: Vec<SkillOption> = tasks
        .iter()
        .filter(|task| selected_section.as_deref() == Some(task.section_code.as_str()))
        .map(|task| SkillOption {
            task,
            latest: latest.get(&task.code).copied(),
        })
        .collect();

    let requests = list_requests_for_therapist(db.inner(), user.id).await?;
    let child_names: HashMap<i64, &str> = children
        .iter()
        .map(|c| (c.id, c.full_name.as_str()))
        .collect();
    let tasks_by_code: HashMap<&str, &SkillTask> =
        tasks.iter().map(|t| (t.code.as_str(), t)).collect();
    let rows: Vec<RequestRow> = requests
        .iter()
        .map(|request| {
            let task = tasks_by_code.get(request.skill_code.as_str());
            RequestRow {
                request,
                child_name: child_names.get(&request.child_id).copied().unwrap_or("-"),
                therapist_name: &user.full_name,
                max_score: task.map(|t| t.max_score),
                objective: task.map(|t| t.objective.as_str()),
            }
        })
        .collect();

    let mut context = page_context(Some(&user), flash);
    context.insert("children", &children);
    context.insert("selected_child", &child);
    context.insert("sections", &sections);
    context.insert("selected_section", &selected_section);
    context.insert("skills", &skills);
    context.insert(
        "selected_skill",
        &skill_code.as_deref().map(normalize_skill_code),
    );
    context.insert("requests", &rows);
    views.render("requests.html", &context)
}

#[derive(Debug, FromForm)]
pub struct RequestForm {
    pub child_id: i64,
    pub skill_code: String,
    pub reason: String,
    pub requested_score: String,
    pub requested_is_prompted: bool,
    pub requested_assessment_date: Option<String>,
    pub requested_comment: Option<String>,
    pub section: Option<String>,
}

#[post("/requests", data = "<form>")]
pub async fn submit_request(form: Form<RequestForm>, user: User, db: &State<SqlitePool>) -> Action {
    user.require_permission(Permission::RequestEdits)?;

    let section = normalize_section(form.section.as_deref());
    let back = requests_url(form.child_id, section.as_deref());
    let skill_code = normalize_skill_code(&form.skill_code);

    let mut tx = db.begin().await?;

    if !is_assigned_therapist(&mut *tx, form.child_id, user.id).await? {
        return Ok(failure(back, "You are not assigned to this child."));
    }

    let Some(task) = get_task(&mut *tx, &skill_code).await? else {
        return Ok(failure(back, format!("Unknown skill code {}.", skill_code)));
    };

    if !has_assessment(&mut *tx, form.child_id, &task.code).await? {
        return Ok(failure(
            back,
            format!(
                "{} has no assessment yet. Record an initial assessment first.",
                task.code
            ),
        ));
    }

    let reason = form.reason.trim();
    if reason.is_empty() {
        return Ok(failure(back, "Explain why the assessment should change."));
    }

    let Some(requested_score) = parse_score(&form.requested_score, task.max_score) else {
        return Ok(failure(
            back,
            format!(
                "Requested score for {} must be between 0 and {}.",
                task.code, task.max_score
            ),
        ));
    };

    let requested_assessment_date = match optional_text(form.requested_assessment_date.as_deref())
    {
        None => None,
        Some(raw) => match parse_date(&raw) {
            Some(date) => Some(date),
            None => return Ok(failure(back, "Requested date must be YYYY-MM-DD.")),
        },
    };

    if has_pending_request(&mut *tx, user.id, form.child_id, &task.code).await? {
        return Ok(failure(
            back,
            format!("A request for {} is already waiting for review.", task.code),
        ));
    }

    let request_id = insert_edit_request(
        &mut *tx,
        &NewEditRequest {
            child_id: form.child_id,
            therapist_id: user.id,
            skill_code: task.code.clone(),
            reason: reason.to_string(),
            requested_score: Some(requested_score),
            requested_is_prompted: Some(form.requested_is_prompted),
            requested_assessment_date,
            requested_comment: optional_text(form.requested_comment.as_deref()),
        },
    )
    .await?;
    log_action(
        &mut *tx,
        Some(user.id),
        "submit_edit_request",
        &format!(
            "Request {} for child {} skill {}",
            request_id, form.child_id, task.code
        ),
    )
    .await?;
    tx.commit().await?;

    info!(request_id, skill = %task.code, "Edit request submitted");
    Ok(success(
        requests_url(form.child_id, Some(&task.section_code)),
        format!("Edit request for {} sent for review.", task.code),
    ))
}

#[get("/admin/edit-requests")]
pub async fn review_page(
    user: User,
    flash: Option<FlashMessage<'_>>,
    db: &State<SqlitePool>,
    views: &State<Views>,
) -> Page {
    user.require_permission(Permission::ReviewEditRequests)?;

    let requests = list_edit_requests(db.inner()).await?;
    let children = list_children(db.inner()).await?;
    let users = list_users(db.inner()).await?;
    let tasks = all_tasks(db.inner()).await?;

    let child_names: HashMap<i64, &str> = children
        .iter()
        .map(|c| (c.id, c.full_name.as_str()))
        .collect();
    let user_names: HashMap<i64, &str> =
        users.iter().map(|u| (u.id, u.full_name.as_str())).collect();
    let tasks_by_code: HashMap<&str, &SkillTask> =
        tasks.iter().map(|t| (t.code.as_str(), t)).collect();

    let rows: Vec<RequestRow> = requests
        .iter()
        .map(|request| {
            let task = tasks_by_code.get(request.skill_code.as_str());
            RequestRow {
                request,
                child_name: child_names.get(&request.child_id).copied().unwrap_or("-"),
                therapist_name: user_names
                    .get(&request.therapist_id)
                    .copied()
                    .unwrap_or("-"),
                max_score: task.map(|t| t.max_score),
                objective: task.map(|t| t.objective.as_str()),
            }
        })
        .collect();

    let mut context = page_context(Some(&user), flash);
    context.insert("requests", &rows);
    views.render("admin/edit_requests.html", &context)
}

#[derive(Debug, FromForm)]
pub struct DecisionForm {
    pub decision: String,
    pub admin_comment: Option<String>,
}

async fn decide(
    db: &SqlitePool,
    reviewer: &User,
    request_id: i64,
    decision: &str,
    admin_comment: Option<&str>,
) -> Result<String, AppError> {
    let mut tx = db.begin().await?;

    let message = match decision {
        "approved" => {
            let assessment_id =
                approve_edit_request(&mut *tx, request_id, reviewer.id, admin_comment).await?;
            log_action(
                &mut *tx,
                Some(reviewer.id),
                "approve_edit_request",
                &format!(
                    "Approved request {} as assessment {}",
                    request_id, assessment_id
                ),
            )
            .await?;
            format!("Request {} approved.", request_id)
        }
        "rejected" => {
            reject_edit_request(&mut *tx, request_id, reviewer.id, admin_comment).await?;
            log_action(
                &mut *tx,
                Some(reviewer.id),
                "reject_edit_request",
                &format!("Rejected request {}", request_id),
            )
            .await?;
            format!("Request {} rejected.", request_id)
        }
        other => {
            return Err(AppError::Validation(format!(
                "Unknown decision \"{}\".",
                other
            )));
        }
    };

    tx.commit().await?;
    Ok(message)
}

#[post("/admin/edit-requests/<request_id>/decision", data = "<form>")]
pub async fn decide_request(
    request_id: i64,
    form: Form<DecisionForm>,
    user: User,
    db: &State<SqlitePool>,
) -> Action {
    user.require_permission(Permission::ReviewEditRequests)?;

    let decision = form.decision.trim().to_lowercase();
    let admin_comment = optional_text(form.admin_comment.as_deref());

    match decide(
        db.inner(),
        &user,
        request_id,
        &decision,
        admin_comment.as_deref(),
    )
    .await
    {
        Ok(message) => {
            info!(request_id, decision = %decision, "Edit request reviewed");
            Ok(success(REVIEW_URL, message))
        }
        Err(e) => flash_error(e, REVIEW_URL),
    }
}
