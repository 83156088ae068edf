use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::catalog::section_rank;
use crate::models::{Assessment, SkillTask};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkillLevel {
    None,
    MasteredPrompted,
    MasteredIndependent,
    Mid,
    Low,
}

impl SkillLevel {
    pub const ALL: [SkillLevel; 5] = [
        SkillLevel::MasteredIndependent,
        SkillLevel::MasteredPrompted,
        SkillLevel::Mid,
        SkillLevel::Low,
        SkillLevel::None,
    ];

    /// Level for a latest `(score, prompted)` record against a task maximum.
    pub fn classify(record: Option<(i64, bool)>, max_score: i64) -> Self {
        let Some((score, prompted)) = record else {
            return SkillLevel::None;
        };

        let ratio = score as f64 / max_score.max(1) as f64;
        if ratio >= 1.0 {
            if prompted {
                SkillLevel::MasteredPrompted
            } else {
                SkillLevel::MasteredIndependent
            }
        } else if ratio >= 0.5 {
            SkillLevel::Mid
        } else {
            SkillLevel::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SkillLevel::None => "Not assessed",
            SkillLevel::MasteredPrompted => "Mastered with prompt",
            SkillLevel::MasteredIndependent => "Mastered independently",
            SkillLevel::Mid => "Emerging (50-99%)",
            SkillLevel::Low => "Low (<50%)",
        }
    }

    /// Fill color as RGB components in `0.0..=1.0`.
    pub fn rgb(&self) -> (f32, f32, f32) {
        match self {
            SkillLevel::None => (1.0, 1.0, 1.0),
            SkillLevel::MasteredPrompted => (0.60, 0.80, 0.95),
            SkillLevel::MasteredIndependent => (0.30, 0.69, 0.31),
            SkillLevel::Mid => (1.0, 0.84, 0.31),
            SkillLevel::Low => (0.96, 0.55, 0.55),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MapCell {
    Gap {
        item_number: i64,
    },
    Skill {
        item_number: i64,
        code: String,
        objective: String,
        score: Option<i64>,
        max_score: i64,
        prompted: bool,
        level: SkillLevel,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapColumn {
    pub section_code: String,
    pub section_name: String,
    pub max_item: i64,
    /// Ordered from `max_item` down to 1.
    pub cells: Vec<MapCell>,
}

impl MapColumn {
    /// Cell drawn at `row` (0 = top) of a grid `height` rows tall. Columns are
    /// bottom-aligned so item 1 always sits on the last row.
    pub fn cell_at(&self, row: usize, height: usize) -> Option<&MapCell> {
        let offset = height.checked_sub(self.cells.len())?;
        row.checked_sub(offset).and_then(|index| self.cells.get(index))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LevelTotals {
    pub none: u32,
    pub mastered_prompted: u32,
    pub mastered_independent: u32,
    pub mid: u32,
    pub low: u32,
}

impl LevelTotals {
    pub fn record(&mut self, level: SkillLevel) {
        *self.slot(level) += 1;
    }

    fn slot(&mut self, level: SkillLevel) -> &mut u32 {
        match level {
            SkillLevel::None => &mut self.none,
            SkillLevel::MasteredPrompted => &mut self.mastered_prompted,
            SkillLevel::MasteredIndependent => &mut self.mastered_independent,
            SkillLevel::Mid => &mut self.mid,
            SkillLevel::Low => &mut self.low,
        }
    }

    pub fn get(&self, level: SkillLevel) -> u32 {
        match level {
            SkillLevel::None => self.none,
            SkillLevel::MasteredPrompted => self.mastered_prompted,
            SkillLevel::MasteredIndependent => self.mastered_independent,
            SkillLevel::Mid => self.mid,
            SkillLevel::Low => self.low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub level: SkillLevel,
    pub label: &'static str,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillsMap {
    pub columns: Vec<MapColumn>,
    pub totals: LevelTotals,
}

impl SkillsMap {
    /// Height of the tallest column, in rows.
    pub fn max_rows(&self) -> usize {
        self.columns.iter().map(|c| c.cells.len()).max().unwrap_or(0)
    }

    /// Row-major view of the grid for table rendering; `None` pads short columns.
    pub fn rows(&self) -> Vec<Vec<Option<&MapCell>>> {
        let height = self.max_rows();
        (0..height)
            .map(|row| {
                self.columns
                    .iter()
                    .map(|column| column.cell_at(row, height))
                    .collect()
            })
            .collect()
    }

    pub fn legend(&self) -> Vec<LegendEntry> {
        SkillLevel::ALL
            .iter()
            .map(|level| LegendEntry {
                level: *level,
                label: level.label(),
                count: self.totals.get(*level),
            })
            .collect()
    }
}

pub fn build_skills_map<'a, I>(
    tasks: I,
    latest_by_skill: &HashMap<String, &Assessment>,
) -> SkillsMap
where
    I: IntoIterator<Item = &'a SkillTask>,
{
    let mut sections: BTreeMap<(usize, String), (String, BTreeMap<i64, &'a SkillTask>)> =
        BTreeMap::new();

    for task in tasks {
        let (_, items) = sections
            .entry((section_rank(&task.section_code), task.section_code.clone()))
            .or_insert_with(|| (task.section_name.clone(), BTreeMap::new()));
        items.insert(task.item_number, task);
    }

    let mut totals = LevelTotals::default();
    let mut columns = Vec::with_capacity(sections.len());

    for ((_, section_code), (section_name, items)) in sections {
        let max_item = items.keys().next_back().copied().unwrap_or(0);
        let mut cells = Vec::with_capacity(max_item.max(0) as usize);

        for item_number in (1..=max_item).rev() {
            let Some(task) = items.get(&item_number) else {
                cells.push(MapCell::Gap { item_number });
                continue;
            };

            let latest = latest_by_skill.get(&task.code);
            let level = SkillLevel::classify(
                latest.map(|a| (a.score, a.is_prompted)),
                task.max_score,
            );
            totals.record(level);

            cells.push(MapCell::Skill {
                item_number,
                code: task.code.clone(),
                objective: task.objective.clone(),
                score: latest.map(|a| a.score),
                max_score: task.max_score,
                prompted: latest.is_some_and(|a| a.is_prompted),
                level,
            });
        }

        columns.push(MapColumn {
            section_code,
            section_name,
            max_item,
            cells,
        });
    }

    SkillsMap { columns, totals }
}
