//! Aggregation over a child's assessment history.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::catalog::section_rank;
use crate::models::{Assessment, SkillTask};

pub const ALL_SECTIONS: &str = "ALL";

pub fn normalize_skill_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

fn recency(a: &Assessment, b: &Assessment) -> Ordering {
    (a.assessment_date, a.created_at, a.id).cmp(&(b.assessment_date, b.created_at, b.id))
}

/// Keeps the most recent assessment per skill code: the row with the greatest
/// `(assessment_date, created_at)`, then the greater id.
pub fn latest_assessment_by_skill<'a, I>(history: I) -> HashMap<String, &'a Assessment>
where
    I: IntoIterator<Item = &'a Assessment>,
{
    let mut latest: HashMap<String, &'a Assessment> = HashMap::new();

    for row in history {
        let code = normalize_skill_code(&row.skill_code);
        if code.is_empty() {
            continue;
        }
        latest
            .entry(code)
            .and_modify(|current| {
                if recency(row, current) == Ordering::Greater {
                    *current = row;
                }
            })
            .or_insert(row);
    }

    latest
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionProgress {
    pub section_code: String,
    pub section_name: String,
    pub total: u32,
    pub scored: u32,
    pub mastered: u32,
    pub relative_points: f64,
    pub max_points: f64,
    pub completion_pct: f64,
    pub score_pct: f64,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn by_section_order(a: &str, b: &str) -> Ordering {
    (section_rank(a), a).cmp(&(section_rank(b), b))
}

pub fn section_progress<'a, I>(
    tasks: I,
    latest_by_skill: &HashMap<String, &Assessment>,
) -> Vec<SectionProgress>
where
    I: IntoIterator<Item = &'a SkillTask>,
{
    let mut stats: HashMap<&str, SectionProgress> = HashMap::new();

    for task in tasks {
        let entry = stats
            .entry(task.section_code.as_str())
            .or_insert_with(|| SectionProgress {
                section_code: task.section_code.clone(),
                section_name: task.section_name.clone(),
                total: 0,
                scored: 0,
                mastered: 0,
                relative_points: 0.0,
                max_points: 0.0,
                completion_pct: 0.0,
                score_pct: 0.0,
            });

        entry.total += 1;
        entry.max_points += task.max_score as f64;

        let Some(latest) = latest_by_skill.get(&task.code) else {
            continue;
        };

        entry.scored += 1;
        entry.relative_points += latest.score as f64;
        if latest.score >= task.max_score {
            entry.mastered += 1;
        }
    }

    let mut rows: Vec<SectionProgress> = stats
        .into_values()
        .map(|mut row| {
            let total = row.total.max(1) as f64;
            row.completion_pct = round1(row.mastered as f64 / total * 100.0);
            row.score_pct = if row.max_points > 0.0 {
                round1(row.relative_points / row.max_points * 100.0)
            } else {
                0.0
            };
            row
        })
        .collect();

    rows.sort_by(|a, b| by_section_order(&a.section_code, &b.section_code));
    rows
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionOption {
    pub code: String,
    pub name: String,
}

/// Distinct sections present in `tasks`, in canonical order.
pub fn section_options(tasks: &[SkillTask]) -> Vec<SectionOption> {
    let mut options: Vec<SectionOption> = Vec::new();
    for task in tasks {
        if options.iter().any(|o| o.code == task.section_code) {
            continue;
        }
        options.push(SectionOption {
            code: task.section_code.clone(),
            name: task.section_name.clone(),
        });
    }
    options.sort_by(|a, b| by_section_order(&a.code, &b.code));
    options
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub independent: u32,
    pub prompted: u32,
}

/// Per-day count of non-zero scores, split by prompting.
pub fn daily_activity<'a, I>(history: I) -> Vec<DailyActivity>
where
    I: IntoIterator<Item = &'a Assessment>,
{
    let mut by_day: BTreeMap<NaiveDate, (u32, u32)> = BTreeMap::new();

    for row in history.into_iter().filter(|row| row.score > 0) {
        let counts = by_day.entry(row.assessment_date).or_default();
        if row.is_prompted {
            counts.1 += 1;
        } else {
            counts.0 += 1;
        }
    }

    by_day
        .into_iter()
        .map(|(date, (independent, prompted))| DailyActivity {
            date,
            independent,
            prompted,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptMode {
    All,
    Independent,
    Prompted,
}

impl PromptMode {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("independent") => PromptMode::Independent,
            Some("prompted") => PromptMode::Prompted,
            _ => PromptMode::All,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptMode::All => "ALL",
            PromptMode::Independent => "independent",
            PromptMode::Prompted => "prompted",
        }
    }

    pub fn admits(&self, assessment: &Assessment) -> bool {
        match self {
            PromptMode::All => true,
            PromptMode::Independent => !assessment.is_prompted,
            PromptMode::Prompted => assessment.is_prompted,
        }
    }
}

/// Report filters. Section and code prefix narrow the task list; prompt mode
/// and the date range narrow the history before the latest-per-skill pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportFilters {
    pub section: Option<String>,
    pub mode: PromptMode,
    pub code_prefix: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl Default for ReportFilters {
    fn default() -> Self {
        Self {
            section: None,
            mode: PromptMode::All,
            code_prefix: None,
            date_from: None,
            date_to: None,
        }
    }
}

impl ReportFilters {
    pub fn tasks<'a>(&self, tasks: &'a [SkillTask]) -> Vec<&'a SkillTask> {
        tasks
            .iter()
            .filter(|task| {
                self.section
                    .as_deref()
                    .is_none_or(|section| task.section_code == section)
            })
            .filter(|task| {
                self.code_prefix
                    .as_deref()
                    .is_none_or(|prefix| task.code.starts_with(prefix))
            })
            .collect()
    }

    pub fn history<'a>(&self, history: &'a [Assessment]) -> Vec<&'a Assessment> {
        history
            .iter()
            .filter(|row| self.mode.admits(row))
            .filter(|row| self.date_from.is_none_or(|from| row.assessment_date >= from))
            .filter(|row| self.date_to.is_none_or(|to| row.assessment_date <= to))
            .collect()
    }

    pub fn describe(&self) -> String {
        let mut parts = vec![format!(
            "section: {}",
            self.section.as_deref().unwrap_or(ALL_SECTIONS)
        )];
        parts.push(format!("mode: {}", self.mode.as_str()));
        if let Some(prefix) = &self.code_prefix {
            parts.push(format!("code: {}*", prefix));
        }
        match (self.date_from, self.date_to) {
            (Some(from), Some(to)) => parts.push(format!("{} to {}", from, to)),
            (Some(from), None) => parts.push(format!("from {}", from)),
            (None, Some(to)) => parts.push(format!("until {}", to)),
            (None, None) => {}
        }
        parts.join(", ")
    }
}
