use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewDashboard,
    ViewKnowledgeBase,
    ViewReports,

    ViewChildren,
    RecordAssessments,
    RequestEdits,

    ViewOwnChildrenProgress,

    ManageChildren,
    AssignCaregivers,
    ViewAllChildren,
    ReviewEditRequests,
    ViewAuditLog,
    ViewUsers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Therapist,
    Parent,
}

static COMMON_PERMISSIONS: [Permission; 3] = [
    Permission::ViewDashboard,
    Permission::ViewKnowledgeBase,
    Permission::ViewReports,
];

static PARENT_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(COMMON_PERMISSIONS);
    permissions.insert(Permission::ViewOwnChildrenProgress);

    permissions
});

static THERAPIST_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(COMMON_PERMISSIONS);
    permissions.insert(Permission::ViewChildren);
    permissions.insert(Permission::RecordAssessments);
    permissions.insert(Permission::RequestEdits);

    permissions
});

static ADMIN_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(COMMON_PERMISSIONS);
    permissions.insert(Permission::ViewChildren);
    permissions.insert(Permission::ManageChildren);
    permissions.insert(Permission::AssignCaregivers);
    permissions.insert(Permission::ViewAllChildren);
    permissions.insert(Permission::ReviewEditRequests);
    permissions.insert(Permission::ViewAuditLog);
    permissions.insert(Permission::ViewUsers);

    permissions
});

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Therapist, Role::Parent];

    pub fn permissions(&self) -> &'static HashSet<Permission> {
        match self {
            Role::Admin => &ADMIN_PERMISSIONS,
            Role::Therapist => &THERAPIST_PERMISSIONS,
            Role::Parent => &PARENT_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Therapist => "therapist",
            Role::Parent => "parent",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "Administrator",
            Role::Therapist => "Therapist",
            Role::Parent => "Parent",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, AppError> {
        match s {
            "admin" => Ok(Role::Admin),
            "therapist" => Ok(Role::Therapist),
            "parent" => Ok(Role::Parent),
            _ => Err(AppError::Validation(format!("Unknown role: {}", s))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
