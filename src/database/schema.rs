pub const CURRENT_SCHEMA: &str = r#"
PRAGMA foreign_keys = 1;

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    full_name TEXT NOT NULL,
    role TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS user_sessions (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    token TEXT NOT NULL UNIQUE,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    expires_at TIMESTAMP NOT NULL,
    FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS children (
    id INTEGER PRIMARY KEY,
    full_name TEXT NOT NULL,
    birth_date DATE,
    notes TEXT,
    created_by INTEGER,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (created_by) REFERENCES users (id)
);

CREATE TABLE IF NOT EXISTS child_therapist_assignments (
    id INTEGER PRIMARY KEY,
    child_id INTEGER NOT NULL,
    therapist_id INTEGER NOT NULL,
    assigned_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (child_id, therapist_id),
    FOREIGN KEY (child_id) REFERENCES children (id) ON DELETE CASCADE,
    FOREIGN KEY (therapist_id) REFERENCES users (id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS child_parent_assignments (
    id INTEGER PRIMARY KEY,
    child_id INTEGER NOT NULL,
    parent_id INTEGER NOT NULL,
    assigned_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (child_id, parent_id),
    FOREIGN KEY (child_id) REFERENCES children (id) ON DELETE CASCADE,
    FOREIGN KEY (parent_id) REFERENCES users (id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS ablls_tasks (
    code TEXT PRIMARY KEY,
    section_code TEXT NOT NULL,
    section_name TEXT NOT NULL,
    item_number INTEGER NOT NULL,
    objective TEXT NOT NULL DEFAULT '',
    criteria TEXT NOT NULL DEFAULT '',
    max_score INTEGER NOT NULL DEFAULT 1,
    source_sheet TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS assessments (
    id INTEGER PRIMARY KEY,
    child_id INTEGER NOT NULL,
    therapist_id INTEGER NOT NULL,
    skill_code TEXT NOT NULL,
    score INTEGER NOT NULL,
    is_prompted BOOLEAN NOT NULL DEFAULT 0,
    assessment_date DATE NOT NULL,
    comment TEXT,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (child_id) REFERENCES children (id) ON DELETE CASCADE,
    FOREIGN KEY (therapist_id) REFERENCES users (id)
);

CREATE TABLE IF NOT EXISTS edit_requests (
    id INTEGER PRIMARY KEY,
    child_id INTEGER NOT NULL,
    therapist_id INTEGER NOT NULL,
    skill_code TEXT NOT NULL,
    reason TEXT NOT NULL,
    requested_score INTEGER,
    requested_is_prompted BOOLEAN,
    requested_assessment_date DATE,
    requested_comment TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    admin_comment TEXT,
    applied_assessment_id INTEGER,
    reviewed_by INTEGER,
    reviewed_at TIMESTAMP,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (child_id) REFERENCES children (id) ON DELETE CASCADE,
    FOREIGN KEY (therapist_id) REFERENCES users (id),
    FOREIGN KEY (applied_assessment_id) REFERENCES assessments (id),
    FOREIGN KEY (reviewed_by) REFERENCES users (id)
);

CREATE TABLE IF NOT EXISTS audit_logs (
    id INTEGER PRIMARY KEY,
    user_id INTEGER,
    action TEXT NOT NULL,
    details TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (user_id) REFERENCES users (id)
);

CREATE INDEX IF NOT EXISTS idx_ablls_tasks_section ON ablls_tasks (section_code, item_number);
CREATE INDEX IF NOT EXISTS idx_assessments_child_skill ON assessments (child_id, skill_code);
CREATE INDEX IF NOT EXISTS idx_edit_requests_status ON edit_requests (status, created_at);
CREATE INDEX IF NOT EXISTS idx_audit_logs_created ON audit_logs (created_at);
"#;
