use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{NewTodo, Todo, TodoChanges};

/// Todo persistence. Every read and write after insert is scoped by owner in
/// the query predicate, so a foreign todo is never touched.
#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn insert(&self, todo: NewTodo) -> anyhow::Result<Todo>;
    /// Newest first.
    async fn list_by_owner(&self, owner: Uuid) -> anyhow::Result<Vec<Todo>>;
    async fn update_owned(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: TodoChanges,
    ) -> anyhow::Result<Option<Todo>>;
    async fn delete_owned(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool>;
    async fn toggle_owned(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Todo>>;
}

#[derive(Clone)]
pub struct PgTodoStore {
    db: PgPool,
}

impl PgTodoStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TodoStore for PgTodoStore {
    async fn insert(&self, todo: NewTodo) -> anyhow::Result<Todo> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            INSERT INTO todos (user_id, title, description, priority, due_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, title, description, priority, due_date,
                      status, created_at, updated_at
            "#,
        )
        .bind(todo.user_id)
        .bind(&todo.title)
        .bind(&todo.description)
        .bind(todo.priority)
        .bind(todo.due_date)
        .fetch_one(&self.db)
        .await
        .context("insert todo")?;
        Ok(row)
    }

    async fn list_by_owner(&self, owner: Uuid) -> anyhow::Result<Vec<Todo>> {
        let rows = sqlx::query_as::<_, Todo>(
            r#"
            SELECT id, user_id, title, description, priority, due_date,
                   status, created_at, updated_at
              FROM todos
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.db)
        .await
        .context("list todos by owner")?;
        Ok(rows)
    }

    async fn update_owned(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: TodoChanges,
    ) -> anyhow::Result<Option<Todo>> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            UPDATE todos
               SET title       = COALESCE($3, title),
                   description = COALESCE($4, description),
                   priority    = COALESCE($5, priority),
                   due_date    = $6,
                   updated_at  = now()
             WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, title, description, priority, due_date,
                      status, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(changes.title)
        .bind(changes.description)
        .bind(changes.priority)
        .bind(changes.due_date)
        .fetch_optional(&self.db)
        .await
        .context("update todo")?;
        Ok(row)
    }

    async fn delete_owned(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM todos WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.db)
            .await
            .context("delete todo")?;
        Ok(res.rows_affected() > 0)
    }

    async fn toggle_owned(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Todo>> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            UPDATE todos
               SET status = CASE status
                                WHEN 'pending' THEN 'completed'::todo_status
                                ELSE 'pending'::todo_status
                            END,
                   updated_at = now()
             WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, title, description, priority, due_date,
                      status, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await
        .context("toggle todo")?;
        Ok(row)
    }
}
