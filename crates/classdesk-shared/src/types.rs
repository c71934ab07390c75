use serde::{Deserialize, Serialize};
use uuid::Uuid;

// User identity = the identity provider's stable key, a UUID v4.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ComplaintId(pub Uuid);

impl ComplaintId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for ComplaintId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ComplaintId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// The role attached to a user profile.  Every authorization decision matches
/// exhaustively over this enum; there is no fallback role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Parent,
    Teacher,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Student, Role::Parent, Role::Teacher, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Parent => "parent",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "student" => Some(Role::Student),
            "parent" => Some(Role::Parent),
            "teacher" => Some(Role::Teacher),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Complaint status
// ---------------------------------------------------------------------------

/// Status of a complaint.  `Answered` and `Rejected` are expected to end the
/// lifecycle but are not structurally terminal: any status is reachable from
/// any status, matching the product's permissive workflow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    New,
    Assigned,
    InProgress,
    NeedsClarification,
    Answered,
    Rejected,
}

impl ComplaintStatus {
    pub const ALL: [ComplaintStatus; 6] = [
        ComplaintStatus::New,
        ComplaintStatus::Assigned,
        ComplaintStatus::InProgress,
        ComplaintStatus::NeedsClarification,
        ComplaintStatus::Answered,
        ComplaintStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplaintStatus::New => "new",
            ComplaintStatus::Assigned => "assigned",
            ComplaintStatus::InProgress => "in_progress",
            ComplaintStatus::NeedsClarification => "needs_clarification",
            ComplaintStatus::Answered => "answered",
            ComplaintStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "new" => Some(ComplaintStatus::New),
            "assigned" => Some(ComplaintStatus::Assigned),
            "in_progress" => Some(ComplaintStatus::InProgress),
            "needs_clarification" => Some(ComplaintStatus::NeedsClarification),
            "answered" => Some(ComplaintStatus::Answered),
            "rejected" => Some(ComplaintStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Complaint kind
// ---------------------------------------------------------------------------

/// Whether a submission is a complaint or a suggestion.  Teachers may only
/// submit suggestions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintKind {
    Complaint,
    Suggestion,
}

impl ComplaintKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplaintKind::Complaint => "complaint",
            ComplaintKind::Suggestion => "suggestion",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "complaint" => Some(ComplaintKind::Complaint),
            "suggestion" => Some(ComplaintKind::Suggestion),
            _ => None,
        }
    }
}

impl std::fmt::Display for ComplaintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Fixed category list offered by the submission form.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Academics,
    Facilities,
    Safety,
    Extracurricular,
    Communication,
    Improvement,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Academics => "academics",
            Category::Facilities => "facilities",
            Category::Safety => "safety",
            Category::Extracurricular => "extracurricular",
            Category::Communication => "communication",
            Category::Improvement => "improvement",
            Category::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "academics" => Some(Category::Academics),
            "facilities" => Some(Category::Facilities),
            "safety" => Some(Category::Safety),
            "extracurricular" => Some(Category::Extracurricular),
            "communication" => Some(Category::Communication),
            "improvement" => Some(Category::Improvement),
            "other" => Some(Category::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
