use std::io::Cursor;

use chrono::Local;
use rocket::http::ContentType;
use rocket::request::FlashMessage;
use rocket::response::{self, Flash, Redirect, Responder};
use rocket::{Request, Response, State};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use super::{Page, RECENT_LIMIT, failure, normalize_section, select_child, visible_children};
use crate::auth::{Permission, User};
use crate::db::{all_tasks, assessments_for_child};
use crate::env::Settings;
use crate::error::AppError;
use crate::models::{Assessment, Child, SkillTask};
use crate::progress::{
    ALL_SECTIONS, DailyActivity, PromptMode, ReportFilters, SectionOption, SectionProgress,
    daily_activity, latest_assessment_by_skill, normalize_skill_code, section_options,
    section_progress,
};
use crate::report::{ReportFonts, ReportInput, render_report, report_filename};
use crate::skills_map::{SkillsMap, build_skills_map};
use crate::validation::{optional_text, parse_date};
use crate::views::{Views, page_context};

/// Query parameters shared by the report pages and the PDF export.
#[derive(Debug, Default, Clone, FromForm, Serialize)]
pub struct ReportQuery {
    pub child_id: Option<i64>,
    pub section: Option<String>,
    pub mode: Option<String>,
    pub code: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

impl ReportQuery {
    pub fn filters(&self) -> ReportFilters {
        let date = |raw: &Option<String>| {
            optional_text(raw.as_deref()).and_then(|value| parse_date(&value))
        };

        ReportFilters {
            section: normalize_section(self.section.as_deref())
                .filter(|section| section != ALL_SECTIONS),
            mode: PromptMode::parse(self.mode.as_deref()),
            code_prefix: self
                .code
                .as_deref()
                .map(normalize_skill_code)
                .filter(|code| !code.is_empty()),
            date_from: date(&self.date_from),
            date_to: date(&self.date_to),
        }
    }

    /// Query string for links to the sibling report views.
    pub fn to_query(&self, child_id: i64, filters: &ReportFilters) -> String {
        let mut parts = vec![format!("child_id={}", child_id)];
        if let Some(section) = &filters.section {
            parts.push(format!("section={}", section));
        }
        if filters.mode != PromptMode::All {
            parts.push(format!("mode={}", filters.mode.as_str()));
        }
        if let Some(code) = &filters.code_prefix {
            parts.push(format!("code={}", code));
        }
        if let Some(from) = filters.date_from {
            parts.push(format!("date_from={}", from));
        }
        if let Some(to) = filters.date_to {
            parts.push(format!("date_to={}", to));
        }
        parts.join("&")
    }
}

/// Everything a report view needs for one child, loaded once.
struct ReportData {
    children: Vec<Child>,
    child: Option<Child>,
    tasks: Vec<SkillTask>,
    history: Vec<Assessment>,
    filters: ReportFilters,
}

async fn load_report(
    db: &SqlitePool,
    user: &User,
    query: &ReportQuery,
) -> Result<ReportData, AppError> {
    let children = visible_children(db, user).await?;
    let child = select_child(&children, query.child_id).cloned();
    let tasks = all_tasks(db).await?;
    let history = match &child {
        Some(child) => assessments_for_child(db, child.id).await?,
        None => Vec::new(),
    };

    Ok(ReportData {
        children,
        child,
        tasks,
        history,
        filters: query.filters(),
    })
}

/// Derived figures for the filtered slice of a child's data.
struct ReportView<'a> {
    tasks: Vec<&'a SkillTask>,
    history: Vec<&'a Assessment>,
    sections: Vec<SectionProgress>,
    map: SkillsMap,
    activity: Vec<DailyActivity>,
    section_options: Vec<SectionOption>,
}

impl ReportData {
    fn view(&self) -> ReportView<'_> {
        let tasks = self.filters.tasks(&self.tasks);
        let history = self.filters.history(&self.history);
        let latest = latest_assessment_by_skill(history.iter().copied());

        ReportView {
            sections: section_progress(tasks.iter().copied(), &latest),
            map: build_skills_map(tasks.iter().copied(), &latest),
            activity: daily_activity(history.iter().copied()),
            section_options: section_options(&self.tasks),
            tasks,
            history,
        }
    }

    fn base_context(
        &self,
        user: &User,
        flash: Option<FlashMessage<'_>>,
        query: &ReportQuery,
    ) -> tera::Context {
        let mut context = page_context(Some(user), flash);
        context.insert("children", &self.children);
        context.insert("selected_child", &self.child);
        context.insert("filters", &self.filters);
        context.insert("filters_label", &self.filters.describe());
        context.insert("query", query);
        context.insert(
            "query_string",
            &self
                .child
                .as_ref()
                .map(|child| query.to_query(child.id, &self.filters)),
        );
        context
    }
}

#[get("/reports?<query..>")]
pub async fn reports_page(
    query: ReportQuery,
    user: User,
    flash: Option<FlashMessage<'_>>,
    db: &State<SqlitePool>,
    views: &State<Views>,
) -> Page {
    user.require_permission(Permission::ViewReports)?;

    let data = load_report(db.inner(), &user, &query).await?;
    let view = data.view();
    let recent: Vec<&Assessment> = view.history.iter().rev().take(RECENT_LIMIT).copied().collect();

    let mut context = data.base_context(&user, flash, &query);
    context.insert("section_options", &view.section_options);
    context.insert("sections", &view.sections);
    context.insert("activity", &view.activity);
    context.insert("recent", &recent);
    context.insert("task_count", &view.tasks.len());
    context.insert("legend", &view.map.legend());
    views.render("reports.html", &context)
}

#[get("/reports/skills-map?<query..>")]
pub async fn skills_map_page(
    query: ReportQuery,
    user: User,
    flash: Option<FlashMessage<'_>>,
    db: &State<SqlitePool>,
    views: &State<Views>,
) -> Page {
    user.require_permission(Permission::ViewReports)?;

    let data = load_report(db.inner(), &user, &query).await?;
    let view = data.view();

    let mut context = data.base_context(&user, flash, &query);
    context.insert("section_options", &view.section_options);
    context.insert("columns", &view.map.columns);
    context.insert("rows", &view.map.rows());
    context.insert("legend", &view.map.legend());
    context.insert("task_count", &view.tasks.len());
    views.render("skills_map.html", &context)
}

/// A rendered PDF sent as an attachment.
pub struct PdfDownload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl<'r> Responder<'r, 'static> for PdfDownload {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        Response::build()
            .header(ContentType::PDF)
            .raw_header(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", self.filename),
            )
            .sized_body(self.bytes.len(), Cursor::new(self.bytes))
            .ok()
    }
}

#[derive(Responder)]
pub enum ExportResponse {
    Pdf(PdfDownload),
    Redirect(Flash<Redirect>),
}

#[get("/reports/export?<query..>")]
pub async fn export_report(
    query: ReportQuery,
    user: User,
    db: &State<SqlitePool>,
    settings: &State<Settings>,
) -> Result<ExportResponse, AppError> {
    user.require_permission(Permission::ViewReports)?;

    let data = load_report(db.inner(), &user, &query).await?;
    let Some(child) = data.child.clone() else {
        return Ok(ExportResponse::Redirect(failure(
            "/reports",
            "Choose a child before exporting a report.",
        )));
    };

    let view = data.view();
    let generated_on = Local::now().date_naive();
    let filters_label = data.filters.describe();
    let task_count = view.tasks.len();
    let ReportView { map, sections, .. } = view;
    let font_setting = settings.report_font.clone();
    let child_name = child.full_name.clone();

    let bytes = tokio::task::spawn_blocking(move || {
        let fonts = ReportFonts::load(font_setting.as_deref());
        render_report(
            &ReportInput {
                child_name: &child_name,
                generated_on,
                filters_label,
                task_count,
                map: &map,
                sections: &sections,
            },
            &fonts,
        )
    })
    .await
    .map_err(|e| AppError::Internal(format!("Report task failed: {}", e)))??;

    let filename = report_filename(&child.full_name, generated_on);
    info!(child_id = child.id, size = bytes.len(), file = %filename, "Report exported");

    Ok(ExportResponse::Pdf(PdfDownload { filename, bytes }))
}

#[get("/progress?<child_id>")]
pub async fn progress_page(
    child_id: Option<i64>,
    user: User,
    flash: Option<FlashMessage<'_>>,
    db: &State<SqlitePool>,
    views: &State<Views>,
) -> Page {
    user.require_permission(Permission::ViewOwnChildrenProgress)?;

    let query = ReportQuery {
        child_id,
        ..ReportQuery::default()
    };
    let data = load_report(db.inner(), &user, &query).await?;
    let view = data.view();
    let recent: Vec<&Assessment> = view.history.iter().rev().take(RECENT_LIMIT).copied().collect();

    let mut context = data.base_context(&user, flash, &query);
    context.insert("sections", &view.sections);
    context.insert("activity", &view.activity);
    context.insert("recent", &recent);
    context.insert("legend", &view.map.legend());
    views.render("progress.html", &context)
}
