use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "todo_priority", rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// Single persisted completion state. Overdue is derived at read time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "todo_status", rename_all = "lowercase")]
pub enum Status {
    #[default]
    Pending,
    Completed,
}

impl Status {
    pub fn toggled(self) -> Self {
        match self {
            Status::Pending => Status::Completed,
            Status::Completed => Status::Pending,
        }
    }

    pub fn is_completed(self) -> bool {
        self == Status::Completed
    }
}

/// Todo row in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Todo {
    pub id: Uuid,
    pub user_id: Uuid, // owner, never changes
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub due_date: OffsetDateTime,
    pub status: Status,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

impl Todo {
    pub fn is_overdue(&self, now: OffsetDateTime) -> bool {
        self.status == Status::Pending && self.due_date < now
    }
}

/// Validated input for an insert.
#[derive(Debug, Clone)]
pub struct NewTodo {
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub due_date: OffsetDateTime,
}

/// Validated field replacements for an update; `None` keeps the stored value.
#[derive(Debug, Clone)]
pub struct TodoChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: OffsetDateTime,
}
