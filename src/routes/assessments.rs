use rocket::State;
use rocket::form::Form;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use super::{Action, Page, RECENT_LIMIT, failure, normalize_section, select_child, visible_children};
use crate::auth::{Permission, User};
use crate::db::{
    all_tasks, assessments_for_child, get_task, has_assessment, insert_assessment,
    is_assigned_therapist, log_action, recent_assessments,
};
use crate::models::{Assessment, NewAssessment, SkillTask};
use crate::progress::{latest_assessment_by_skill, normalize_skill_code, section_options};
use crate::validation::{optional_text, parse_date, parse_score};
use crate::views::{Views, page_context};

#[derive(Serialize)]
struct TaskRow<'a> {
    task: &'a SkillTask,
    latest: Option<&'a Assessment>,
}

pub fn assessments_url(child_id: i64, section: Option<&str>) -> String {
    match section {
        Some(section) => format!("/assessments?child_id={}&section={}", child_id, section),
        None => format!("/assessments?child_id={}", child_id),
    }
}

#[get("/assessments?<child_id>&<section>")]
pub async fn assessments_page(
    child_id: Option<i64>,
    section: Option<String>,
    user: User,
    flash: Option<FlashMessage<'_>>,
    db: &State<SqlitePool>,
    views: &State<Views>,
) -> Page {
    user.require_permission(Permission::RecordAssessments)?;

    let children = visible_children(db.inner(), &user).await?;
    let child = select_child(&children, child_id);

    let tasks = all_tasks(db.inner()).await?;
    let sections = section_options(&tasks);
    let selected_section = normalize_section(section.as_deref())
        .filter(|code| sections.iter().any(|s| &s.code == code))
        .or_else(|| sections.first().map(|s| s.code.clone()));

    let (history, recent) = match child {
        Some(child) => (
            assessments_for_child(db.inner(), child.id).await?,
            recent_assessments(db.inner(), child.id, RECENT_LIMIT as i64).await?,
        ),
        None => (Vec::new(), Vec::new()),
    };
    let latest = latest_assessment_by_skill(&history);

    let rows: Vec<TaskRow> = tasks
        .iter()
        .filter(|task| selected_section.as_deref() == Some(task.section_code.as_str()))
        .map(|task| TaskRow {
            task,
            latest: latest.get(&task.code).copied(),
        })
        .collect();

    let mut context = page_context(Some(&user), flash);
    context.insert("children", &children);
    context.insert("selected_child", &child);
    context.insert("sections", &sections);
    context.insert("selected_section", &selected_section);
    context.insert("rows", &rows);
    context.insert("recent", &recent);
    views.render("assessments.html", &context)
}

#[derive(Debug, FromForm)]
pub struct AssessmentForm {
    pub child_id: i64,
    pub skill_code: String,
    pub score: String,
    pub is_prompted: bool,
    pub assessment_date: String,
    pub comment: Option<String>,
    pub section: Option<String>,
}

#[post("/assessments", data = "<form>")]
pub async fn record_assessment(
    form: Form<AssessmentForm>,
    user: User,
    db: &State<SqlitePool>,
) -> Action {
    user.require_permission(Permission::RecordAssessments)?;

    let section = normalize_section(form.section.as_deref());
    let back = assessments_url(form.child_id, section.as_deref());
    let skill_code = normalize_skill_code(&form.skill_code);

    let mut tx = db.begin().await?;

    if !is_assigned_therapist(&mut *tx, form.child_id, user.id).await? {
        return Ok(failure(back, "You are not assigned to this child."));
    }

    let Some(task) = get_task(&mut *tx, &skill_code).await? else {
        return Ok(failure(back, format!("Unknown skill code {}.", skill_code)));
    };

    let Some(score) = parse_score(&form.score, task.max_score) else {
        return Ok(failure(
            back,
            format!("Score for {} must be between 0 and {}.", task.code, task.max_score),
        ));
    };

    let Some(assessment_date) = parse_date(&form.assessment_date) else {
        return Ok(failure(back, "Assessment date must be YYYY-MM-DD."));
    };

    if has_assessment(&mut *tx, form.child_id, &task.code).await? {
        let url = format!(
            "/requests?child_id={}&section={}&skill_code={}",
            form.child_id, task.section_code, task.code
        );
        return Ok(Flash::warning(
            Redirect::to(url),
            format!(
                "{} already has an initial assessment. Submit an edit request instead.",
                task.code
            ),
        ));
    }

    let assessment_id = insert_assessment(
        &mut *tx,
        &NewAssessment {
            child_id: form.child_id,
            therapist_id: user.id,
            skill_code: task.code.clone(),
            score,
            is_prompted: form.is_prompted,
            assessment_date,
            comment: optional_text(form.comment.as_deref()),
        },
    )
    .await?;
    log_action(
        &mut *tx,
        Some(user.id),
        "record_assessment",
        &format!(
            "Child {} skill {} scored {}/{}{}",
            form.child_id,
            task.code,
            score,
            task.max_score,
            if form.is_prompted { " (prompted)" } else { "" }
        ),
    )
    .await?;
    tx.commit().await?;

    info!(assessment_id, skill = %task.code, "Assessment recorded");
    Ok(Flash::success(
        Redirect::to(assessments_url(form.child_id, Some(&task.section_code))),
        format!("Saved {} for {}.", score, task.code),
    ))
}
