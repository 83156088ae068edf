use chrono::{Duration, Local, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{Pool, Sqlite, SqliteConnection, SqliteExecutor};
use tracing::{info, instrument};

use crate::auth::{DbUser, DbUserSession, Role, User, UserSession};
use crate::catalog::sort_tasks;
use crate::error::AppError;
use crate::models::{
    AssignmentLink, Assessment, AuditEntry, Child, DbEditRequest, EditRequest, EditRequestStatus,
    NewAssessment, NewEditRequest, SkillTask,
};

const USER_COLUMNS: &str = "id, email, full_name, role, created_at";
const SESSION_COLUMNS: &str = "user_id, token, expires_at";
const CHILD_COLUMNS: &str = "id, full_name, birth_date, notes, created_by, created_at";
const TASK_COLUMNS: &str =
    "code, section_code, section_name, item_number, objective, criteria, max_score, source_sheet";
const ASSESSMENT_COLUMNS: &str = "id, child_id, therapist_id, skill_code, score, is_prompted, \
     assessment_date, comment, created_at";
const EDIT_REQUEST_COLUMNS: &str = "id, child_id, therapist_id, skill_code, reason, \
     requested_score, requested_is_prompted, requested_assessment_date, requested_comment, \
     status, admin_comment, applied_assessment_id, reviewed_by, reviewed_at, created_at";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

// Users

#[instrument(skip(executor, password))]
pub async fn create_user(
    executor: impl SqliteExecutor<'_>,
    email: &str,
    full_name: &str,
    role: Role,
    password: &str,
) -> Result<i64, AppError> {
    info!("Creating user");
    let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    let result = sqlx::query(
        "INSERT INTO users (email, full_name, role, password_hash) VALUES (?, ?, ?, ?)",
    )
    .bind(email.trim().to_lowercase())
    .bind(full_name.trim())
    .bind(role.as_str())
    .bind(password_hash)
    .execute(executor)
    .await;

    match result {
        Ok(done) => Ok(done.last_insert_rowid()),
        Err(e) if is_unique_violation(&e) => Err(AppError::Conflict(format!(
            "Email {} is already registered",
            email
        ))),
        Err(e) => Err(e.into()),
    }
}

#[instrument(skip(executor))]
pub async fn get_user(executor: impl SqliteExecutor<'_>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM users WHERE id = ?",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    match row {
        Some(user) => User::try_from(user),
        None => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

/// Returns the user when `password` matches the stored hash.
#[instrument(skip(pool, password))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    email: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");
    let row = sqlx::query_as::<_, (i64, String)>(
        "SELECT id, password_hash FROM users WHERE email = ?",
    )
    .bind(email.trim().to_lowercase())
    .fetch_optional(pool)
    .await?;

    let Some((id, password_hash)) = row else {
        return Ok(None);
    };

    if !bcrypt::verify(password, &password_hash)? {
        return Ok(None);
    }

    get_user(pool, id).await.map(Some)
}

#[instrument(skip(executor))]
pub async fn list_users(executor: impl SqliteExecutor<'_>) -> Result<Vec<User>, AppError> {
    info!("Listing users");
    let rows = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM users ORDER BY created_at DESC, id DESC",
        USER_COLUMNS
    ))
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(User::try_from).collect()
}

#[instrument(skip(executor))]
pub async fn list_users_by_role(
    executor: impl SqliteExecutor<'_>,
    role: Role,
) -> Result<Vec<User>, AppError> {
    info!("Listing users by role");
    let rows = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM users WHERE role = ? ORDER BY full_name",
        USER_COLUMNS
    ))
    .bind(role.as_str())
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(User::try_from).collect()
}

// Sessions

#[instrument(skip(executor))]
pub async fn create_user_session(
    executor: impl SqliteExecutor<'_>,
    user_id: i64,
    duration_hours: i64,
) -> Result<UserSession, AppError> {
    info!("Creating user session");
    let token = UserSession::generate_token();
    let expires_at = Utc::now().naive_utc() + Duration::hours(duration_hours);

    let session = sqlx::query_as::<_, DbUserSession>(&format!(
        "INSERT INTO user_sessions (user_id, token, expires_at) VALUES (?, ?, ?) RETURNING {}",
        SESSION_COLUMNS
    ))
    .bind(user_id)
    .bind(token)
    .bind(expires_at)
    .fetch_one(executor)
    .await?;

    Ok(UserSession::from(session))
}

#[instrument(skip_all)]
pub async fn get_session_by_token(
    executor: impl SqliteExecutor<'_>,
    token: &str,
) -> Result<UserSession, AppError> {
    let session = sqlx::query_as::<_, DbUserSession>(&format!(
        "SELECT {} FROM user_sessions WHERE token = ?",
        SESSION_COLUMNS
    ))
    .bind(token)
    .fetch_optional(executor)
    .await?;

    session
        .map(UserSession::from)
        .ok_or_else(|| AppError::Authentication("Unknown session token".to_string()))
}

#[instrument(skip_all)]
pub async fn invalidate_session(
    executor: impl SqliteExecutor<'_>,
    token: &str,
) -> Result<(), AppError> {
    info!("Invalidating session");
    sqlx::query("DELETE FROM user_sessions WHERE token = ?")
        .bind(token)
        .execute(executor)
        .await?;
    Ok(())
}

#[instrument(skip(executor))]
pub async fn clean_expired_sessions(executor: impl SqliteExecutor<'_>) -> Result<u64, AppError> {
    let now = Utc::now().naive_utc();
    let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at <= ?")
        .bind(now)
        .execute(executor)
        .await?;

    let removed = result.rows_affected();
    if removed > 0 {
        info!(removed, "Removed expired sessions");
    }
    Ok(removed)
}

// Children and assignments

#[instrument(skip(executor))]
pub async fn create_child(
    executor: impl SqliteExecutor<'_>,
    full_name: &str,
    birth_date: Option<NaiveDate>,
    notes: Option<&str>,
    created_by: Option<i64>,
) -> Result<i64, AppError> {
    info!("Creating child");
    let result = sqlx::query(
        "INSERT INTO children (full_name, birth_date, notes, created_by) VALUES (?, ?, ?, ?)",
    )
    .bind(full_name)
    .bind(birth_date)
    .bind(notes)
    .bind(created_by)
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

#[instrument(skip(executor))]
pub async fn get_child(executor: impl SqliteExecutor<'_>, id: i64) -> Result<Child, AppError> {
    let child = sqlx::query_as::<_, Child>(&format!(
        "SELECT {} FROM children WHERE id = ?",
        CHILD_COLUMNS
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    child.ok_or_else(|| AppError::NotFound(format!("Child with id {} not found", id)))
}

#[instrument(skip(executor))]
pub async fn list_children(executor: impl SqliteExecutor<'_>) -> Result<Vec<Child>, AppError> {
    info!("Listing all children");
    let children = sqlx::query_as::<_, Child>(&format!(
        "SELECT {} FROM children ORDER BY full_name, id",
        CHILD_COLUMNS
    ))
    .fetch_all(executor)
    .await?;
    Ok(children)
}

#[instrument(skip(executor))]
pub async fn children_for_therapist(
    executor: impl SqliteExecutor<'_>,
    therapist_id: i64,
) -> Result<Vec<Child>, AppError> {
    info!("Listing children assigned to therapist");
    let children = sqlx::query_as::<_, Child>(
        "SELECT c.id, c.full_name, c.birth_date, c.notes, c.created_by, c.created_at
         FROM children c
         JOIN child_therapist_assignments a ON a.child_id = c.id
         WHERE a.therapist_id = ?
         ORDER BY c.full_name, c.id",
    )
    .bind(therapist_id)
    .fetch_all(executor)
    .await?;
    Ok(children)
}

#[instrument(skip(executor))]
pub async fn children_for_parent(
    executor: impl SqliteExecutor<'_>,
    parent_id: i64,
) -> Result<Vec<Child>, AppError> {
    info!("Listing children linked to parent");
    let children = sqlx::query_as::<_, Child>(
        "SELECT c.id, c.full_name, c.birth_date, c.notes, c.created_by, c.created_at
         FROM children c
         JOIN child_parent_assignments a ON a.child_id = c.id
         WHERE a.parent_id = ?
         ORDER BY c.full_name, c.id",
    )
    .bind(parent_id)
    .fetch_all(executor)
    .await?;
    Ok(children)
}

#[instrument(skip(executor))]
pub async fn is_assigned_therapist(
    executor: impl SqliteExecutor<'_>,
    child_id: i64,
    therapist_id: i64,
) -> Result<bool, AppError> {
    let found = sqlx::query_scalar::<_, i64>(
        "SELECT 1 FROM child_therapist_assignments WHERE child_id = ? AND therapist_id = ?",
    )
    .bind(child_id)
    .bind(therapist_id)
    .fetch_optional(executor)
    .await?;
    Ok(found.is_some())
}

/// Links a therapist to a child. Returns `false` when the link already existed.
#[instrument(skip(executor))]
pub async fn assign_therapist(
    executor: impl SqliteExecutor<'_>,
    child_id: i64,
    therapist_id: i64,
) -> Result<bool, AppError> {
    info!("Assigning therapist to child");
    let result = sqlx::query(
        "INSERT OR IGNORE INTO child_therapist_assignments (child_id, therapist_id) VALUES (?, ?)",
    )
    .bind(child_id)
    .bind(therapist_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Links a parent to a child. Returns `false` when the link already existed.
#[instrument(skip(executor))]
pub async fn assign_parent(
    executor: impl SqliteExecutor<'_>,
    child_id: i64,
    parent_id: i64,
) -> Result<bool, AppError> {
    info!("Assigning parent to child");
    let result = sqlx::query(
        "INSERT OR IGNORE INTO child_parent_assignments (child_id, parent_id) VALUES (?, ?)",
    )
    .bind(child_id)
    .bind(parent_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

#[instrument(skip(executor))]
pub async fn list_therapist_links(
    executor: impl SqliteExecutor<'_>,
) -> Result<Vec<AssignmentLink>, AppError> {
    let links = sqlx::query_as::<_, AssignmentLink>(
        "SELECT a.child_id, u.id AS user_id, u.full_name, u.email
         FROM child_therapist_assignments a
         JOIN users u ON u.id = a.therapist_id
         ORDER BY u.full_name",
    )
    .fetch_all(executor)
    .await?;
    Ok(links)
}

#[instrument(skip(executor))]
pub async fn list_parent_links(
    executor: impl SqliteExecutor<'_>,
) -> Result<Vec<AssignmentLink>, AppError> {
    let links = sqlx::query_as::<_, AssignmentLink>(
        "SELECT a.child_id, u.id AS user_id, u.full_name, u.email
         FROM child_parent_assignments a
         JOIN users u ON u.id = a.parent_id
         ORDER BY u.full_name",
    )
    .fetch_all(executor)
    .await?;
    Ok(links)
}

// Skill catalog

#[instrument(skip(executor))]
pub async fn count_tasks(executor: impl SqliteExecutor<'_>) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ablls_tasks")
        .fetch_one(executor)
        .await?;
    Ok(count)
}

/// Stores catalog rows in one transaction, replacing rows with the same code.
#[instrument(skip(pool, tasks), fields(count = tasks.len()))]
pub async fn insert_tasks(pool: &Pool<Sqlite>, tasks: &[SkillTask]) -> Result<(), AppError> {
    info!("Storing skill catalog");
    let mut tx = pool.begin().await?;

    for task in tasks {
        sqlx::query(&format!(
            "INSERT OR REPLACE INTO ablls_tasks ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            TASK_COLUMNS
        ))
        .bind(&task.code)
        .bind(&task.section_code)
        .bind(&task.section_name)
        .bind(task.item_number)
        .bind(&task.objective)
        .bind(&task.criteria)
        .bind(task.max_score)
        .bind(&task.source_sheet)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// The whole catalog in canonical section order.
#[instrument(skip(executor))]
pub async fn all_tasks(executor: impl SqliteExecutor<'_>) -> Result<Vec<SkillTask>, AppError> {
    let mut tasks = sqlx::query_as::<_, SkillTask>(&format!(
        "SELECT {} FROM ablls_tasks ORDER BY section_code, item_number",
        TASK_COLUMNS
    ))
    .fetch_all(executor)
    .await?;

    sort_tasks(&mut tasks);
    Ok(tasks)
}

#[instrument(skip(executor))]
pub async fn get_task(
    executor: impl SqliteExecutor<'_>,
    code: &str,
) -> Result<Option<SkillTask>, AppError> {
    let task = sqlx::query_as::<_, SkillTask>(&format!(
        "SELECT {} FROM ablls_tasks WHERE code = ?",
        TASK_COLUMNS
    ))
    .bind(code.trim().to_uppercase())
    .fetch_optional(executor)
    .await?;
    Ok(task)
}

// Assessments

#[instrument(skip(executor))]
pub async fn has_assessment(
    executor: impl SqliteExecutor<'_>,
    child_id: i64,
    skill_code: &str,
) -> Result<bool, AppError> {
    let found = sqlx::query_scalar::<_, i64>(
        "SELECT 1 FROM assessments WHERE child_id = ? AND skill_code = ? LIMIT 1",
    )
    .bind(child_id)
    .bind(skill_code)
    .fetch_optional(executor)
    .await?;
    Ok(found.is_some())
}

#[instrument(skip(executor))]
pub async fn insert_assessment(
    executor: impl SqliteExecutor<'_>,
    assessment: &NewAssessment,
) -> Result<i64, AppError> {
    info!("Recording assessment");
    let result = sqlx::query(
        "INSERT INTO assessments
         (child_id, therapist_id, skill_code, score, is_prompted, assessment_date, comment)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(assessment.child_id)
    .bind(assessment.therapist_id)
    .bind(&assessment.skill_code)
    .bind(assessment.score)
    .bind(assessment.is_prompted)
    .bind(assessment.assessment_date)
    .bind(&assessment.comment)
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Full history of a child, oldest first.
#[instrument(skip(executor))]
pub async fn assessments_for_child(
    executor: impl SqliteExecutor<'_>,
    child_id: i64,
) -> Result<Vec<Assessment>, AppError> {
    let rows = sqlx::query_as::<_, Assessment>(&format!(
        "SELECT {} FROM assessments WHERE child_id = ?
         ORDER BY assessment_date, created_at, id",
        ASSESSMENT_COLUMNS
    ))
    .bind(child_id)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

/// Most recent `limit` assessments of a child, newest first.
#[instrument(skip(executor))]
pub async fn recent_assessments(
    executor: impl SqliteExecutor<'_>,
    child_id: i64,
    limit: i64,
) -> Result<Vec<Assessment>, AppError> {
    let rows = sqlx::query_as::<_, Assessment>(&format!(
        "SELECT {} FROM assessments WHERE child_id = ?
         ORDER BY assessment_date DESC, created_at DESC, id DESC
         LIMIT ?",
        ASSESSMENT_COLUMNS
    ))
    .bind(child_id)
    .bind(limit)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

// Edit requests

#[instrument(skip(executor))]
pub async fn has_pending_request(
    executor: impl SqliteExecutor<'_>,
    therapist_id: i64,
    child_id: i64,
    skill_code: &str,
) -> Result<bool, AppError> {
    let found = sqlx::query_scalar::<_, i64>(
        "SELECT 1 FROM edit_requests
         WHERE therapist_id = ? AND child_id = ? AND skill_code = ? AND status = 'pending'
         LIMIT 1",
    )
    .bind(therapist_id)
    .bind(child_id)
    .bind(skill_code)
    .fetch_optional(executor)
    .await?;
    Ok(found.is_some())
}

#[instrument(skip(executor))]
pub async fn insert_edit_request(
    executor: impl SqliteExecutor<'_>,
    request: &NewEditRequest,
) -> Result<i64, AppError> {
    info!("Filing edit request");
    let result = sqlx::query(
        "INSERT INTO edit_requests
         (child_id, therapist_id, skill_code, reason, requested_score, requested_is_prompted,
          requested_assessment_date, requested_comment, status)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'pending')",
    )
    .bind(request.child_id)
    .bind(request.therapist_id)
    .bind(&request.skill_code)
    .bind(&request.reason)
    .bind(request.requested_score)
    .bind(request.requested_is_prompted)
    .bind(request.requested_assessment_date)
    .bind(&request.requested_comment)
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

#[instrument(skip(executor))]
pub async fn get_edit_request(
    executor: impl SqliteExecutor<'_>,
    id: i64,
) -> Result<EditRequest, AppError> {
    let row = sqlx::query_as::<_, DbEditRequest>(&format!(
        "SELECT {} FROM edit_requests WHERE id = ?",
        EDIT_REQUEST_COLUMNS
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    match row {
        Some(row) => EditRequest::try_from(row),
        None => Err(AppError::NotFound(format!("Edit request {} not found", id))),
    }
}

#[instrument(skip(executor))]
pub async fn list_edit_requests(
    executor: impl SqliteExecutor<'_>,
) -> Result<Vec<EditRequest>, AppError> {
    let rows = sqlx::query_as::<_, DbEditRequest>(&format!(
        "SELECT {} FROM edit_requests ORDER BY created_at DESC, id DESC",
        EDIT_REQUEST_COLUMNS
    ))
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(EditRequest::try_from).collect()
}

#[instrument(skip(executor))]
pub async fn list_requests_for_therapist(
    executor: impl SqliteExecutor<'_>,
    therapist_id: i64,
) -> Result<Vec<EditRequest>, AppError> {
    let rows = sqlx::query_as::<_, DbEditRequest>(&format!(
        "SELECT {} FROM edit_requests WHERE therapist_id = ?
         ORDER BY created_at DESC, id DESC",
        EDIT_REQUEST_COLUMNS
    ))
    .bind(therapist_id)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(EditRequest::try_from).collect()
}

async fn pending_request(
    conn: &mut SqliteConnection,
    request_id: i64,
) -> Result<EditRequest, AppError> {
    let request = get_edit_request(&mut *conn, request_id).await?;
    if request.status != EditRequestStatus::Pending {
        return Err(AppError::Conflict(format!(
            "Edit request {} was already {}",
            request_id, request.status
        )));
    }
    Ok(request)
}

/// Applies a pending request: records its requested values as a new
/// assessment, links it, then marks the request approved. Runs on the
/// caller's transaction; any error leaves the request pending.
#[instrument(skip(conn))]
pub async fn approve_edit_request(
    conn: &mut SqliteConnection,
    request_id: i64,
    reviewer_id: i64,
    admin_comment: Option<&str>,
) -> Result<i64, AppError> {
    info!("Approving edit request");
    let request = pending_request(conn, request_id).await?;

    let task = get_task(&mut *conn, &request.skill_code)
        .await?
        .ok_or_else(|| {
            AppError::Validation(format!("Unknown skill {}", request.skill_code))
        })?;

    let score = request.requested_score.ok_or_else(|| {
        AppError::Validation(format!(
            "Edit request {} carries no requested score",
            request_id
        ))
    })?;
    if !(0..=task.max_score).contains(&score) {
        return Err(AppError::Validation(format!(
            "Requested score {} for {} is outside 0..{}",
            score, task.code, task.max_score
        )));
    }

    let assessment_id = insert_assessment(
        &mut *conn,
        &NewAssessment {
            child_id: request.child_id,
            therapist_id: request.therapist_id,
            skill_code: task.code.clone(),
            score,
            is_prompted: request.requested_is_prompted.unwrap_or(false),
            assessment_date: request
                .requested_assessment_date
                .unwrap_or_else(|| Local::now().date_naive()),
            comment: request.requested_comment.clone(),
        },
    )
    .await?;

    let updated = sqlx::query(
        "UPDATE edit_requests
         SET status = 'approved', admin_comment = ?, reviewed_by = ?,
             reviewed_at = ?, applied_assessment_id = ?
         WHERE id = ? AND status = 'pending'",
    )
    .bind(admin_comment)
    .bind(reviewer_id)
    .bind(Utc::now().naive_utc())
    .bind(assessment_id)
    .bind(request_id)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::Conflict(format!(
            "Edit request {} changed while it was being approved",
            request_id
        )));
    }

    Ok(assessment_id)
}

#[instrument(skip(conn))]
pub async fn reject_edit_request(
    conn: &mut SqliteConnection,
    request_id: i64,
    reviewer_id: i64,
    admin_comment: Option<&str>,
) -> Result<(), AppError> {
    info!("Rejecting edit request");
    pending_request(conn, request_id).await?;

    sqlx::query(
        "UPDATE edit_requests
         SET status = 'rejected', admin_comment = ?, reviewed_by = ?, reviewed_at = ?
         WHERE id = ? AND status = 'pending'",
    )
    .bind(admin_comment)
    .bind(reviewer_id)
    .bind(Utc::now().naive_utc())
    .bind(request_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// Audit trail

#[instrument(skip(executor))]
pub async fn log_action(
    executor: impl SqliteExecutor<'_>,
    user_id: Option<i64>,
    action: &str,
    details: &str,
) -> Result<(), AppError> {
    sqlx::query("INSERT INTO audit_logs (user_id, action, details) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(action)
        .bind(details)
        .execute(executor)
        .await?;
    Ok(())
}

#[instrument(skip(executor))]
pub async fn recent_audit(
    executor: impl SqliteExecutor<'_>,
    limit: i64,
) -> Result<Vec<AuditEntry>, AppError> {
    let rows = sqlx::query_as::<_, AuditEntry>(
        "SELECT l.id, l.user_id, u.email AS user_email, l.action, l.details, l.created_at
         FROM audit_logs l
         LEFT JOIN users u ON u.id = l.user_id
         ORDER BY l.created_at DESC, l.id DESC
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

// Dashboard

#[derive(Debug, Default, Clone, Serialize)]
pub struct DashboardCounts {
    pub children: i64,
    pub assessments: i64,
    pub pending_requests: i64,
    pub tasks: i64,
    pub users: i64,
}

async fn count(pool: &Pool<Sqlite>, sql: &str, id: Option<i64>) -> Result<i64, AppError> {
    let mut query = sqlx::query_scalar::<_, i64>(sql);
    if let Some(id) = id {
        query = query.bind(id);
    }
    Ok(query.fetch_one(pool).await?)
}

/// Figures shown on the dashboard, scoped to what `user` may see.
#[instrument(skip(pool, user), fields(user_id = user.id))]
pub async fn dashboard_counts(pool: &Pool<Sqlite>, user: &User) -> Result<DashboardCounts, AppError> {
    let tasks = count_tasks(pool).await?;

    let counts = match user.role {
        Role::Admin => DashboardCounts {
            children: count(pool, "SELECT COUNT(*) FROM children", None).await?,
            assessments: count(pool, "SELECT COUNT(*) FROM assessments", None).await?,
            pending_requests: count(
                pool,
                "SELECT COUNT(*) FROM edit_requests WHERE status = 'pending'",
                None,
            )
            .await?,
            tasks,
            users: count(pool, "SELECT COUNT(*) FROM users", None).await?,
        },
        Role::Therapist => DashboardCounts {
            children: count(
                pool,
                "SELECT COUNT(*) FROM child_therapist_assignments WHERE therapist_id = ?",
                Some(user.id),
            )
            .await?,
            assessments: count(
                pool,
                "SELECT COUNT(*) FROM assessments WHERE therapist_id = ?",
                Some(user.id),
            )
            .await?,
            pending_requests: count(
                pool,
                "SELECT COUNT(*) FROM edit_requests WHERE therapist_id = ? AND status = 'pending'",
                Some(user.id),
            )
            .await?,
            tasks,
            users: 0,
        },
        Role::Parent => DashboardCounts {
            children: count(
                pool,
                "SELECT COUNT(*) FROM child_parent_assignments WHERE parent_id = ?",
                Some(user.id),
            )
            .await?,
            assessments: count(
                pool,
                "SELECT COUNT(*) FROM assessments a
                 JOIN child_parent_assignments p ON p.child_id = a.child_id
                 WHERE p.parent_id = ?",
                Some(user.id),
            )
            .await?,
            pending_requests: 0,
            tasks,
            users: 0,
        },
    };

    Ok(counts)
}
