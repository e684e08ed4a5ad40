//! Postgres-backed todo store.
//!
//! One row per todo, keyed by `id`. The table name comes from configuration
//! (`TABLE_NAME`) and is always emitted as a quoted identifier, so names such
//! as `todo-table-dev` work unchanged.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation, on put) | `23505` | `Conflict` |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed / Io / PoolTimedOut | N/A | `Unavailable` |
//! | Other | N/A | `Backend` |

use std::sync::Arc;

use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::instrument;

use todorelay_core::{Entity, Todo, TodoId};

use super::{StoreError, TodoStore};

#[derive(Debug, Clone)]
pub struct PostgresTodoStore {
    pool: Arc<PgPool>,
    table: String,
}

impl PostgresTodoStore {
    /// Wrap an existing pool. `table_name` must not contain `"`.
    pub fn new(pool: PgPool, table_name: &str) -> Self {
        Self {
            pool: Arc::new(pool),
            table: quote_ident(table_name),
        }
    }

    /// Connect a fresh pool.
    pub async fn connect(database_url: &str, table_name: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool, table_name))
    }

    /// Create the table if it does not exist yet.
    #[instrument(skip(self), fields(table = %self.table), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id UUID PRIMARY KEY,
                task TEXT NOT NULL,
                completed BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
            table = self.table
        );
        sqlx::query(&ddl)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl TodoStore for PostgresTodoStore {
    #[instrument(skip(self, todo), fields(todo_id = %todo.id()), err)]
    async fn put(&self, todo: &Todo) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {} (id, task, completed) VALUES ($1, $2, $3)",
            self.table
        );
        sqlx::query(&sql)
            .bind(todo.id().as_uuid())
            .bind(&todo.task)
            .bind(todo.completed)
            .execute(&*self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict(*todo.id())
                } else {
                    map_sqlx_error("put", e)
                }
            })?;
        Ok(())
    }

    #[instrument(skip(self), fields(todo_id = %id), err)]
    async fn get(&self, id: &TodoId) -> Result<Option<Todo>, StoreError> {
        let sql = format!("SELECT id, task, completed FROM {} WHERE id = $1", self.table);
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;
        row.map(|r| todo_from_row(&r)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> Result<Vec<Todo>, StoreError> {
        let sql = format!(
            "SELECT id, task, completed FROM {} ORDER BY created_at ASC, id ASC",
            self.table
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list", e))?;
        rows.iter().map(todo_from_row).collect()
    }
}

fn todo_from_row(row: &PgRow) -> Result<Todo, StoreError> {
    let decode = |e: sqlx::Error| StoreError::Backend(format!("failed to decode todo row: {e}"));
    Ok(Todo {
        id: TodoId::from_uuid(row.try_get::<uuid::Uuid, _>("id").map_err(decode)?),
        task: row.try_get("task").map_err(decode)?,
        completed: row.try_get("completed").map_err(decode)?,
    })
}

fn quote_ident(name: &str) -> String {
    format!("\"{name}\"")
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            StoreError::Backend(format!("database error in {}: {}", operation, db_err.message()))
        }
        unavailable @ (sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) => {
            StoreError::Unavailable(format!("{operation}: {unavailable}"))
        }
        other => StoreError::Backend(format!("{operation}: {other}")),
    }
}
