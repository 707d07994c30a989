use serde::{Deserialize, Serialize};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
    PrimitiveDateTime,
};
use uuid::Uuid;

use super::repo_types::{NewTodo, Priority, Status, Todo, TodoChanges};
use crate::error::ApiError;

pub const TITLE_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize = 2000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTodoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<String>,
}

impl CreateTodoRequest {
    pub fn into_new_todo(self, owner: Uuid) -> Result<NewTodo, ApiError> {
        let title = match self.title.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => return Err(ApiError::missing("Title is required")),
        };
        let due_date = required_due_date(self.due_date.as_deref())?;
        check_title(&title)?;
        let description = self.description.map(check_description).transpose()?;
        Ok(NewTodo {
            user_id: owner,
            title,
            description,
            priority: self.priority.unwrap_or_default(),
            due_date,
        })
    }
}

impl UpdateTodoRequest {
    pub fn into_changes(self) -> Result<TodoChanges, ApiError> {
        let due_date = required_due_date(self.due_date.as_deref())?;
        let title = match self.title {
            Some(t) => {
                let t = t.trim().to_string();
                if t.is_empty() {
                    return Err(ApiError::invalid("Title cannot be empty"));
                }
                check_title(&t)?;
                Some(t)
            }
            None => None,
        };
        let description = self.description.map(check_description).transpose()?;
        Ok(TodoChanges {
            title,
            description,
            priority: self.priority,
            due_date,
        })
    }
}

fn check_title(title: &str) -> Result<(), ApiError> {
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(ApiError::invalid(format!(
            "Title must be at most {TITLE_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

fn check_description(description: String) -> Result<String, ApiError> {
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(ApiError::invalid(format!(
            "Description must be at most {DESCRIPTION_MAX_CHARS} characters"
        )));
    }
    Ok(description)
}

fn required_due_date(raw: Option<&str>) -> Result<OffsetDateTime, ApiError> {
    match raw.map(str::trim) {
        Some(s) if !s.is_empty() => parse_due_date(s),
        _ => Err(ApiError::missing("Due date is required")),
    }
}

/// Accepts an RFC 3339 timestamp, a local `YYYY-MM-DDTHH:MM[:SS[.fff]]` taken as UTC
/// (what a `datetime-local` input sends), or a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_due_date(raw: &str) -> Result<OffsetDateTime, ApiError> {
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(ts);
    }
    let local = format_description!(
        "[year]-[month]-[day]T[hour]:[minute][optional [:[second][optional [.[subsecond]]]]]"
    );
    if let Ok(ts) = PrimitiveDateTime::parse(raw, local) {
        return Ok(ts.assume_utc());
    }
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .map(|d| d.midnight().assume_utc())
        .map_err(|_| ApiError::invalid(format!("Invalid due date: {raw}")))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    #[serde(with = "time::serde::rfc3339")]
    pub due_date: OffsetDateTime,
    pub status: Status,
    pub is_completed: bool,
    pub is_overdue: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl TodoResponse {
    pub fn at(todo: Todo, now: OffsetDateTime) -> Self {
        Self {
            is_overdue: todo.is_overdue(now),
            is_completed: todo.status.is_completed(),
            id: todo.id,
            user_id: todo.user_id,
            title: todo.title,
            description: todo.description,
            priority: todo.priority,
            due_date: todo.due_date,
            status: todo.status,
            created_at: todo.created_at,
            updated_at: todo.updated_at,
        }
    }
}

impl From<Todo> for TodoResponse {
    fn from(todo: Todo) -> Self {
        Self::at(todo, OffsetDateTime::now_utc())
    }
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub message: String,
    pub todo: TodoResponse,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
