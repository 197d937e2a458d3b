use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Priority assigned when the form omits it or sends garbage.
pub const DEFAULT_PRIORITY: i64 = 2;

pub const MAX_USERNAME_LEN: usize = 80;
pub const MAX_DESCRIPTION_LEN: usize = 200;
pub const MAX_TAG_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TaskStatus {
    NotDone,
    Done,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Task {
    pub id: i64,
    pub user_id: i64,
    pub description: String,
    pub added: NaiveDateTime,
    pub completed_date: Option<NaiveDate>,
    pub deadline: Option<NaiveDate>,
    pub status: TaskStatus,
    pub is_archived: bool,
    pub priority: i64,
    pub sort_order: i64,
    pub attachment_filename: Option<String>,
}

impl Task {
    /// Signed number of days from `today` until the deadline.
    pub fn days_until_deadline(&self, today: NaiveDate) -> Option<i64> {
        self.deadline.map(|deadline| (deadline - today).num_days())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// A task together with its explicitly loaded tags.
#[derive(Debug, Clone, Serialize)]
pub struct TaskWithTags {
    #[serde(flatten)]
    pub task: Task,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub description: String,
    pub priority: i64,
    pub deadline: Option<NaiveDate>,
    pub tag_names: Vec<String>,
    pub attachment_filename: Option<String>,
}

#[derive(Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
}

// keep the hash out of logs
impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"[redacted]")
            .finish()
    }
}

impl axum_login::AuthUser for User {
    type Id = i64;

    fn id(&self) -> Self::Id {
        self.id
    }

    // when user changes password, auth session becomes invalid
    fn session_auth_hash(&self) -> &[u8] {
        self.password_hash.as_bytes()
    }
}
