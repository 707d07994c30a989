use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::TodoStore;
use super::repo_types::{NewTodo, Status, Todo, TodoChanges};

/// In-process store with the same owner-scoping as the Postgres one.
#[derive(Default)]
pub struct MemoryTodoStore {
    rows: Mutex<Vec<(u64, Todo)>>,
}

impl MemoryTodoStore {
    fn with_rows<R>(&self, f: impl FnOnce(&mut Vec<(u64, Todo)>) -> R) -> R {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rows)
    }

    pub fn get(&self, id: Uuid) -> Option<Todo> {
        self.with_rows(|rows| rows.iter().find(|(_, t)| t.id == id).map(|(_, t)| t.clone()))
    }
}

#[async_trait]
impl TodoStore for MemoryTodoStore {
    async fn insert(&self, todo: NewTodo) -> anyhow::Result<Todo> {
        let row = Todo {
            id: Uuid::new_v4(),
            user_id: todo.user_id,
            title: todo.title,
            description: todo.description,
            priority: todo.priority,
            due_date: todo.due_date,
            status: Status::Pending,
            created_at: OffsetDateTime::now_utc(),
            updated_at: None,
        };
        self.with_rows(|rows| {
            let seq = rows.iter().map(|(s, _)| *s + 1).max().unwrap_or(0);
            rows.push((seq, row.clone()));
        });
        Ok(row)
    }

    async fn list_by_owner(&self, owner: Uuid) -> anyhow::Result<Vec<Todo>> {
        let mut owned: Vec<(u64, Todo)> = self.with_rows(|rows| {
            rows.iter()
                .filter(|(_, t)| t.user_id == owner)
                .cloned()
                .collect()
        });
        owned.sort_by(|(sa, a), (sb, b)| b.created_at.cmp(&a.created_at).then(sb.cmp(sa)));
        Ok(owned.into_iter().map(|(_, t)| t).collect())
    }

    async fn update_owned(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: TodoChanges,
    ) -> anyhow::Result<Option<Todo>> {
        Ok(self.with_rows(|rows| {
            let (_, t) = rows
                .iter_mut()
                .find(|(_, t)| t.id == id && t.user_id == owner)?;
            if let Some(title) = changes.title {
                t.title = title;
            }
            if let Some(description) = changes.description {
                t.description = Some(description);
            }
            if let Some(priority) = changes.priority {
                t.priority = priority;
            }
            t.due_date = changes.due_date;
            t.updated_at = Some(OffsetDateTime::now_utc());
            Some(t.clone())
        }))
    }

    async fn delete_owned(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool> {
        Ok(self.with_rows(|rows| {
            let before = rows.len();
            rows.retain(|(_, t)| !(t.id == id && t.user_id == owner));
            rows.len() != before
        }))
    }

    async fn toggle_owned(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Todo>> {
        Ok(self.with_rows(|rows| {
            let (_, t) = rows
                .iter_mut()
                .find(|(_, t)| t.id == id && t.user_id == owner)?;
            t.status = t.status.toggled();
            t.updated_at = Some(OffsetDateTime::now_utc());
            Some(t.clone())
        }))
    }
}
