//! ABLLS-R skill catalog ingestion.
//!
//! The catalog ships as an `.xlsx` workbook with one task per row:
//! `[code, objective, criteria, ...]`. Sheets are usually named after a
//! section (`"SECTION B"`), but mixed sheets are accepted too.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use calamine::{Data, Reader, open_workbook_auto};
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::{Pool, Sqlite};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::db::{count_tasks, insert_tasks};
use crate::models::SkillTask;

/// Canonical section order with display names. There is no section O.
pub const SECTIONS: [(&str, &str); 25] = [
    ("A", "Cooperation and Reinforcer Effectiveness"),
    ("B", "Visual Performance"),
    ("C", "Receptive Language"),
    ("D", "Motor Imitation"),
    ("E", "Vocal Imitation"),
    ("F", "Requests"),
    ("G", "Labeling"),
    ("H", "Intraverbals"),
    ("I", "Spontaneous Vocalizations"),
    ("J", "Syntax and Grammar"),
    ("K", "Play and Leisure"),
    ("L", "Social Interaction"),
    ("M", "Group Instruction"),
    ("N", "Classroom Routines"),
    ("P", "Generalized Responding"),
    ("Q", "Reading"),
    ("R", "Math"),
    ("S", "Writing"),
    ("T", "Spelling"),
    ("U", "Dressing"),
    ("V", "Eating"),
    ("W", "Grooming"),
    ("X", "Toileting"),
    ("Y", "Gross Motor"),
    ("Z", "Fine Motor"),
];

const DEFAULT_CRITERIA: &str = "1= yes, 0= no";

/// Item numbers start at 1; anything above this is treated as a typo.
pub const MAX_ITEM_NUMBER: i64 = 200;

static TASK_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z]{1,2})(\d+)$").expect("task code pattern is valid"));
static SCORE_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*=").expect("score token pattern is valid"));

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Workbook not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read workbook: {0}")]
    Workbook(#[from] calamine::Error),
}

/// Position of a section in the canonical order; unknown sections sort last.
pub fn section_rank(section_code: &str) -> usize {
    SECTIONS
        .iter()
        .position(|(code, _)| *code == section_code)
        .unwrap_or(SECTIONS.len())
}

pub fn section_name(section_code: &str) -> String {
    SECTIONS
        .iter()
        .find(|(code, _)| *code == section_code)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| format!("Section {}", section_code))
}

pub fn extract_max_score(criteria: &str) -> i64 {
    SCORE_TOKEN_RE
        .captures_iter(criteria)
        .filter_map(|caps| caps[1].parse::<i64>().ok())
        .max()
        .filter(|max| *max >= 1)
        .unwrap_or(1)
}

/// Section code named by a sheet, if the sheet is dedicated to one known section.
pub fn sheet_to_section(sheet_name: &str) -> Option<&'static str> {
    let normalized = sheet_name.trim().to_uppercase();
    let normalized = normalized
        .strip_prefix("SECTION ")
        .map(str::trim)
        .unwrap_or(&normalized);

    SECTIONS
        .iter()
        .find(|(code, _)| *code == normalized)
        .map(|(code, _)| *code)
}

fn cell_text(cell: Option<&Data>) -> Option<String> {
    match cell {
        None | Some(Data::Empty) => None,
        Some(Data::String(s)) => Some(s.trim().to_string()),
        Some(other) => Some(other.to_string().trim().to_string()),
    }
}

pub fn row_to_task(source_sheet: &str, row: &[Data]) -> Option<SkillTask> {
    let Some(Data::String(raw_code)) = row.first() else {
        return None;
    };

    let code = raw_code.trim().to_uppercase();
    let caps = TASK_CODE_RE.captures(&code)?;
    let section_code = caps[1].to_string();
    let item_number = caps[2]
        .parse::<i64>()
        .ok()
        .filter(|n| (1..=MAX_ITEM_NUMBER).contains(n))?;

    let objective = cell_text(row.get(1)).unwrap_or_default();
    let criteria = cell_text(row.get(2)).unwrap_or_else(|| DEFAULT_CRITERIA.to_string());
    let max_score = extract_max_score(&criteria);

    Some(SkillTask {
        section_name: section_name(&section_code),
        code,
        section_code,
        item_number,
        objective,
        criteria,
        max_score,
        source_sheet: source_sheet.to_string(),
    })
}

/// Normalizes raw sheet rows into the ordered, deduplicated task list.
pub fn tasks_from_sheets<I, R>(sheets: I) -> Vec<SkillTask>
where
    I: IntoIterator<Item = (String, R)>,
    R: IntoIterator<Item = Vec<Data>>,
{
    let mut tasks_by_code: HashMap<String, SkillTask> = HashMap::new();

    for (sheet_name, rows) in sheets {
        let section_from_sheet = sheet_to_section(&sheet_name);
        for row in rows {
            let Some(task) = row_to_task(&sheet_name, &row) else {
                continue;
            };
            if section_from_sheet.is_some_and(|section| section != task.section_code) {
                continue;
            }
            tasks_by_code.insert(task.code.clone(), task);
        }
    }

    let mut tasks: Vec<SkillTask> = tasks_by_code.into_values().collect();
    sort_tasks(&mut tasks);
    tasks
}

pub fn sort_tasks(tasks: &mut [SkillTask]) {
    tasks.sort_by(|a, b| {
        (section_rank(&a.section_code), &a.section_code, a.item_number).cmp(&(
            section_rank(&b.section_code),
            &b.section_code,
            b.item_number,
        ))
    });
}

#[instrument]
pub fn load_tasks_from_workbook(path: &Path) -> Result<Vec<SkillTask>, CatalogError> {
    if !path.exists() {
        return Err(CatalogError::NotFound(path.to_path_buf()));
    }

    let mut workbook = open_workbook_auto(path)?;
    let mut sheets = Vec::new();
    for sheet_name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&sheet_name)?;
        let rows: Vec<Vec<Data>> = range.rows().map(|row| row.to_vec()).collect();
        sheets.push((sheet_name, rows));
    }

    let tasks = tasks_from_sheets(sheets);
    info!(count = tasks.len(), "Parsed skill catalog workbook");
    Ok(tasks)
}

/// Seeds the task table from the workbook the first time the app starts.
/// Ingestion failures are logged and leave the catalog empty.
#[instrument(skip(pool))]
pub async fn ensure_catalog(pool: &Pool<Sqlite>, workbook_path: &Path) -> usize {
    match count_tasks(pool).await {
        Ok(0) => {}
        Ok(_) => return 0,
        Err(e) => {
            error!(error = %e, "Failed to inspect skill catalog");
            return 0;
        }
    }

    let path = workbook_path.to_path_buf();
    let loaded = tokio::task::spawn_blocking(move || load_tasks_from_workbook(&path)).await;

    let tasks = match loaded {
        Ok(Ok(tasks)) => tasks,
        Ok(Err(e)) => {
            error!(error = %e, path = %workbook_path.display(), "Failed to load skill catalog");
            return 0;
        }
        Err(e) => {
            error!(error = %e, "Catalog loader task failed");
            return 0;
        }
    };

    if tasks.is_empty() {
        warn!("Skill catalog workbook parsed, but no tasks were found");
        return 0;
    }

    match insert_tasks(pool, &tasks).await {
        Ok(()) => {
            info!(count = tasks.len(), "Skill catalog loaded");
            tasks.len()
        }
        Err(e) => {
            error!(error = %e, "Failed to store skill catalog");
            0
        }
    }
}
