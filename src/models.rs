use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct SkillTask {
    pub code: String,
    pub section_code: String,
    pub section_name: String,
    pub item_number: i64,
    pub objective: String,
    pub criteria: String,
    pub max_score: i64,
    pub source_sheet: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Child {
    pub id: i64,
    pub full_name: String,
    pub birth_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Assessment {
    pub id: i64,
    pub child_id: i64,
    pub therapist_id: i64,
    pub skill_code: String,
    pub score: i64,
    pub is_prompted: bool,
    pub assessment_date: NaiveDate,
    pub comment: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Values for a new assessment row, either entered directly by a therapist
/// or carried over from an approved edit request.
#[derive(Debug, Clone)]
pub struct NewAssessment {
    pub child_id: i64,
    pub therapist_id: i64,
    pub skill_code: String,
    pub score: i64,
    pub is_prompted: bool,
    pub assessment_date: NaiveDate,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EditRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl EditRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditRequestStatus::Pending => "pending",
            EditRequestStatus::Approved => "approved",
            EditRequestStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, AppError> {
        match s {
            "pending" => Ok(EditRequestStatus::Pending),
            "approved" => Ok(EditRequestStatus::Approved),
            "rejected" => Ok(EditRequestStatus::Rejected),
            _ => Err(AppError::Validation(format!("Unknown request status: {}", s))),
        }
    }
}

impl fmt::Display for EditRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EditRequest {
    pub id: i64,
    pub child_id: i64,
    pub therapist_id: i64,
    pub skill_code: String,
    pub reason: String,
    pub requested_score: Option<i64>,
    pub requested_is_prompted: Option<bool>,
    pub requested_assessment_date: Option<NaiveDate>,
    pub requested_comment: Option<String>,
    pub status: EditRequestStatus,
    pub admin_comment: Option<String>,
    pub applied_assessment_id: Option<i64>,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbEditRequest {
    pub id: i64,
    pub child_id: i64,
    pub therapist_id: i64,
    pub skill_code: String,
    pub reason: String,
    pub requested_score: Option<i64>,
    pub requested_is_prompted: Option<bool>,
    pub requested_assessment_date: Option<NaiveDate>,
    pub requested_comment: Option<String>,
    pub status: String,
    pub admin_comment: Option<String>,
    pub applied_assessment_id: Option<i64>,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl TryFrom<DbEditRequest> for EditRequest {
    type Error = AppError;

    fn try_from(db: DbEditRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            id: db.id,
            child_id: db.child_id,
            therapist_id: db.therapist_id,
            skill_code: db.skill_code,
            reason: db.reason,
            requested_score: db.requested_score,
            requested_is_prompted: db.requested_is_prompted,
            requested_assessment_date: db.requested_assessment_date,
            requested_comment: db.requested_comment,
            status: EditRequestStatus::from_str(&db.status)?,
            admin_comment: db.admin_comment,
            applied_assessment_id: db.applied_assessment_id,
            reviewed_by: db.reviewed_by,
            reviewed_at: db.reviewed_at,
            created_at: db.created_at,
        })
    }
}

/// Proposed replacement values submitted by a therapist.
#[derive(Debug, Clone)]
pub struct NewEditRequest {
    pub child_id: i64,
    pub therapist_id: i64,
    pub skill_code: String,
    pub reason: String,
    pub requested_score: Option<i64>,
    pub requested_is_prompted: Option<bool>,
    pub requested_assessment_date: Option<NaiveDate>,
    pub requested_comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: i64,
    pub user_id: Option<i64>,
    pub user_email: Option<String>,
    pub action: String,
    pub details: String,
    pub created_at: NaiveDateTime,
}

/// One child/user link from either assignment table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AssignmentLink {
    pub child_id: i64,
    pub user_id: i64,
    pub full_name: String,
    pub email: String,
}
