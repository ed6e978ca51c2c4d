use super::domain::{Principal, Role};

/// Everything a caller can ask the portal to do, gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    RegisterGuardian,
    RegisterStudent,
    ViewOwnStudents,
    SubmitApplication,
    ViewOwnApplications,
    RecordDocument,
    RemoveDocument,
    ViewDocuments,
    ReviewDocument,
    ReviewApplication,
    ViewReviewQueue,
    ViewStatistics,
    ManageGroups,
    ViewGroupRoster,
}

impl Action {
    pub const fn label(self) -> &'static str {
        match self {
            Self::RegisterGuardian => "register a guardian profile",
            Self::RegisterStudent => "register students",
            Self::ViewOwnStudents => "list their students",
            Self::SubmitApplication => "submit enrollment applications",
            Self::ViewOwnApplications => "list their applications",
            Self::RecordDocument => "record student documents",
            Self::RemoveDocument => "remove student documents",
            Self::ViewDocuments => "view document checklists",
            Self::ReviewDocument => "review documents",
            Self::ReviewApplication => "review enrollment applications",
            Self::ViewReviewQueue => "view the review queue",
            Self::ViewStatistics => "view enrollment statistics",
            Self::ManageGroups => "manage class groups",
            Self::ViewGroupRoster => "view group rosters",
        }
    }
}

/// Raised when a principal's role does not grant the requested action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("role `{role}` may not {action}", action = .action.label())]
pub struct AccessDenied {
    pub role: Role,
    pub action: Action,
}

/// The single capability check: every entry point funnels through here
/// instead of comparing role strings ad hoc.
pub fn authorize(principal: Principal, action: Action) -> Result<(), AccessDenied> {
    let allowed = match action {
        Action::RegisterGuardian
        | Action::RegisterStudent
        | Action::ViewOwnStudents
        | Action::SubmitApplication
        | Action::ViewOwnApplications
        | Action::RecordDocument
        | Action::RemoveDocument => matches!(principal.role, Role::Guardian),
        Action::ViewDocuments => matches!(
            principal.role,
            Role::Guardian | Role::Director | Role::SepAdmin | Role::SuperAdmin
        ),
        Action::ReviewDocument
        | Action::ReviewApplication
        | Action::ViewReviewQueue
        | Action::ViewStatistics
        | Action::ManageGroups => matches!(
            principal.role,
            Role::Director | Role::SepAdmin | Role::SuperAdmin
        ),
        Action::ViewGroupRoster => matches!(
            principal.role,
            Role::Teacher | Role::Director | Role::SepAdmin | Role::SuperAdmin
        ),
    };

    if allowed {
        Ok(())
    } else {
        Err(AccessDenied {
            role: principal.role,
            action,
        })
    }
}
