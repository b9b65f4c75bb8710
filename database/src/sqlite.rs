use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{migrate::MigrateDatabase, Row, Sqlite, SqlitePool};
use work_item_core::{
    config::WorkflowConfig,
    error::{Result, WorkItemError},
    models::{
        Dependency, ItemFilter, NewDependency, NewWorkItem, Note, Role, RoleTransition,
        UpdateWorkItem, UpsertNote, WorkItem,
    },
    store::{PendingTransition, Store, StoreStats},
};

use crate::common::{
    now, row_to_dependency, row_to_item, row_to_note, row_to_transition,
    sqlx_error_to_work_item_error, tags_to_string,
};

/// SQLite-backed implementation of the `Store` trait.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to `database_url` (a file path or `:memory:`), creating the
    /// database file if it doesn't exist yet.
    pub async fn new(database_url: &str) -> Result<Self> {
        let db_url = if database_url.starts_with(":memory:") || database_url.starts_with("sqlite://") {
            database_url.to_string()
        } else {
            format!("sqlite://{database_url}")
        };

        if !db_url.contains(":memory:") && !Sqlite::database_exists(&db_url).await.unwrap_or(false) {
            Sqlite::create_database(&db_url)
                .await
                .map_err(|e| WorkItemError::Database(format!("failed to create database: {e}")))?;
        }

        let connect_options = if db_url.contains(":memory:") {
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(&db_url)
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Memory)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
        } else {
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(db_url.replace("sqlite://", ""))
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
        };

        let pool = SqlitePool::connect_with(connect_options)
            .await
            .map_err(sqlx_error_to_work_item_error)?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations/sqlite")
            .run(&self.pool)
            .await
            .map_err(|e| WorkItemError::Database(format!("migration failed: {e}")))?;
        tracing::info!("database migrations completed successfully");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_item(&self, item: NewWorkItem, workflow: &WorkflowConfig) -> Result<WorkItem> {
        let (status, role) = workflow.initial_status_and_role(&item.tags, item.status.as_deref())?;

        let depth = match item.parent_id {
            Some(parent_id) => {
                let parent_depth: Option<i32> =
                    sqlx::query_scalar("SELECT depth FROM items WHERE id = ?")
                        .bind(parent_id)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(sqlx_error_to_work_item_error)?;
                let parent_depth =
                    parent_depth.ok_or_else(|| WorkItemError::item_not_found(parent_id))?;
                if parent_depth >= WorkItem::MAX_DEPTH {
                    return Err(WorkItemError::max_depth_exceeded(parent_id));
                }
                parent_depth + 1
            }
            None => 0,
        };

        let now = now();
        let row = sqlx::query(
            r#"
            INSERT INTO items (parent_id, depth, title, description, tags, priority, status, role, previous_role, role_changed_at, created_at, modified_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?, ?)
            RETURNING id, parent_id, depth, title, description, tags, priority, status, role, previous_role, role_changed_at, created_at, modified_at
            "#,
        )
        .bind(item.parent_id)
        .bind(depth)
        .bind(&item.title)
        .bind(&item.description)
        .bind(tags_to_string(&item.tags))
        .bind(item.priority.to_string())
        .bind(&status)
        .bind(role.to_string())
        .bind(now)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_work_item_error)?;

        row_to_item(&row)
    }

    async fn update_item(&self, id: i64, updates: UpdateWorkItem) -> Result<WorkItem> {
        let existing = self.get_item(id).await?;
        if existing.is_none() {
            return Err(WorkItemError::item_not_found(id));
        }
        let existing = existing.unwrap();

        let mut query_builder: sqlx::QueryBuilder<sqlx::Sqlite> =
            sqlx::QueryBuilder::new("UPDATE items SET ");
        let mut has_updates = false;

        macro_rules! push_assignment {
            ($col:literal, $value:expr) => {
                if has_updates {
                    query_builder.push(", ");
                }
                query_builder.push(concat!($col, " = "));
                query_builder.push_bind($value);
                has_updates = true;
            };
        }

        if let Some(title) = &updates.title {
            push_assignment!("title", title.clone());
        }
        if let Some(description) = &updates.description {
            push_assignment!("description", description.clone());
        }
        if let Some(tags) = &updates.tags {
            push_assignment!("tags", tags_to_string(tags));
        }
        if let Some(priority) = updates.priority {
            push_assignment!("priority", priority.to_string());
        }
        if let Some(parent_id) = updates.parent_id {
            push_assignment!("parent_id", parent_id);
            let new_depth = match parent_id {
                Some(pid) => {
                    let parent_depth: Option<i32> =
                        sqlx::query_scalar("SELECT depth FROM items WHERE id = ?")
                            .bind(pid)
                            .fetch_optional(&self.pool)
                            .await
                            .map_err(sqlx_error_to_work_item_error)?;
                    let parent_depth =
                        parent_depth.ok_or_else(|| WorkItemError::item_not_found(pid))?;
                    if parent_depth >= WorkItem::MAX_DEPTH {
                        return Err(WorkItemError::max_depth_exceeded(pid));
                    }
                    parent_depth + 1
                }
                None => 0,
            };
            push_assignment!("depth", new_depth);
        }

        if !has_updates {
            return Ok(existing);
        }

        query_builder.push(", modified_at = ");
        query_builder.push_bind(now());
        query_builder.push(" WHERE id = ");
        query_builder.push_bind(id);
        query_builder.push(
            " RETURNING id, parent_id, depth, title, description, tags, priority, status, role, previous_role, role_changed_at, created_at, modified_at",
        );

        let row = query_builder
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_work_item_error)?;

        row_to_item(&row)
    }

    async fn delete_item(&self, id: i64, recursive: bool) -> Result<Vec<WorkItem>> {
        let has_children: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM items WHERE parent_id = ?)")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(sqlx_error_to_work_item_error)?;

        if has_children && !recursive {
            return Err(WorkItemError::Conflict(format!(
                "item {id} has children; pass recursive=true"
            )));
        }

        let mut tx = self.pool.begin().await.map_err(sqlx_error_to_work_item_error)?;

        let mut to_delete = vec![id];
        let mut i = 0;
        while i < to_delete.len() {
            let current = to_delete[i];
            let children: Vec<i64> =
                sqlx::query_scalar("SELECT id FROM items WHERE parent_id = ?")
                    .bind(current)
                    .fetch_all(&mut *tx)
                    .await
                    .map_err(sqlx_error_to_work_item_error)?;
            to_delete.extend(children);
            i += 1;
        }

        let mut removed = Vec::new();
        // post-order: deepest items first
        for item_id in to_delete.iter().rev() {
            let row = sqlx::query(
                "SELECT id, parent_id, depth, title, description, tags, priority, status, role, previous_role, role_changed_at, created_at, modified_at FROM items WHERE id = ?",
            )
            .bind(item_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(sqlx_error_to_work_item_error)?;
            if let Some(row) = row {
                removed.push(row_to_item(&row)?);
            }
            sqlx::query("DELETE FROM role_transitions WHERE item_id = ?")
                .bind(item_id)
                .execute(&mut *tx)
                .await
                .map_err(sqlx_error_to_work_item_error)?;
            sqlx::query("DELETE FROM dependencies WHERE from_id = ? OR to_id = ?")
                .bind(item_id)
                .bind(item_id)
                .execute(&mut *tx)
                .await
                .map_err(sqlx_error_to_work_item_error)?;
            sqlx::query("DELETE FROM notes WHERE item_id = ?")
                .bind(item_id)
                .execute(&mut *tx)
                .await
                .map_err(sqlx_error_to_work_item_error)?;
            sqlx::query("DELETE FROM items WHERE id = ?")
                .bind(item_id)
                .execute(&mut *tx)
                .await
                .map_err(sqlx_error_to_work_item_error)?;
        }

        tx.commit().await.map_err(sqlx_error_to_work_item_error)?;
        Ok(removed)
    }

    async fn get_item(&self, id: i64) -> Result<Option<WorkItem>> {
        let row = sqlx::query(
            "SELECT id, parent_id, depth, title, description, tags, priority, status, role, previous_role, role_changed_at, created_at, modified_at FROM items WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_work_item_error)?;

        row.map(|r| row_to_item(&r)).transpose()
    }

    async fn items_by_parent(&self, parent_id: Option<i64>) -> Result<Vec<WorkItem>> {
        let rows = match parent_id {
            Some(pid) => sqlx::query(
                "SELECT id, parent_id, depth, title, description, tags, priority, status, role, previous_role, role_changed_at, created_at, modified_at FROM items WHERE parent_id = ?",
            )
            .bind(pid)
            .fetch_all(&self.pool)
            .await,
            None => sqlx::query(
                "SELECT id, parent_id, depth, title, description, tags, priority, status, role, previous_role, role_changed_at, created_at, modified_at FROM items WHERE parent_id IS NULL",
            )
            .fetch_all(&self.pool)
            .await,
        }
        .map_err(sqlx_error_to_work_item_error)?;

        rows.iter().map(row_to_item).collect()
    }

    async fn query_items(&self, filter: ItemFilter) -> Result<Vec<WorkItem>> {
        let mut query_builder: sqlx::QueryBuilder<sqlx::Sqlite> = sqlx::QueryBuilder::new(
            "SELECT id, parent_id, depth, title, description, tags, priority, status, role, previous_role, role_changed_at, created_at, modified_at FROM items",
        );
        let mut has_conditions = false;

        macro_rules! clause {
            () => {
                if has_conditions {
                    query_builder.push(" AND ");
                } else {
                    query_builder.push(" WHERE ");
                    has_conditions = true;
                }
            };
        }

        if let Some(parent_id) = filter.parent_id {
            clause!();
            match parent_id {
                Some(pid) => {
                    query_builder.push("parent_id = ");
                    query_builder.push_bind(pid);
                }
                None => {
                    query_builder.push("parent_id IS NULL");
                }
            }
        }
        if let Some(role) = filter.role {
            clause!();
            query_builder.push("role = ");
            query_builder.push_bind(role.to_string());
        }
        if let Some(status) = &filter.status {
            clause!();
            query_builder.push("status = ");
            query_builder.push_bind(status.clone());
        }
        if let Some(tag) = &filter.tag {
            clause!();
            query_builder.push("(',' || tags || ',') LIKE ");
            query_builder.push_bind(format!("%,{tag},%"));
        }
        if let Some(text) = &filter.text {
            clause!();
            query_builder.push("(title LIKE ");
            query_builder.push_bind(format!("%{text}%"));
            query_builder.push(" OR description LIKE ");
            query_builder.push_bind(format!("%{text}%"));
            query_builder.push(")");
        }

        query_builder.push(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            query_builder.push(" LIMIT ");
            query_builder.push_bind(limit);
        }
        if let Some(offset) = filter.offset {
            query_builder.push(" OFFSET ");
            query_builder.push_bind(offset);
        }

        let rows = query_builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_work_item_error)?;

        rows.iter().map(row_to_item).collect()
    }

    async fn all_items(&self) -> Result<Vec<WorkItem>> {
        let rows = sqlx::query(
            "SELECT id, parent_id, depth, title, description, tags, priority, status, role, previous_role, role_changed_at, created_at, modified_at FROM items",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_work_item_error)?;

        rows.iter().map(row_to_item).collect()
    }

    async fn apply_transitions(&self, transitions: Vec<PendingTransition>) -> Result<Vec<WorkItem>> {
        let mut tx = self.pool.begin().await.map_err(sqlx_error_to_work_item_error)?;
        let mut results = Vec::with_capacity(transitions.len());
        let now = now();

        for t in transitions {
            let current_role: Option<String> =
                sqlx::query_scalar("SELECT role FROM items WHERE id = ? AND status = ?")
                    .bind(t.item_id)
                    .bind(&t.expected_status)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(sqlx_error_to_work_item_error)?;

            let Some(current_role) = current_role else {
                return Err(WorkItemError::ConcurrencyExhausted);
            };

            let row = sqlx::query(
                r#"
                UPDATE items SET status = ?, role = ?, previous_role = ?, role_changed_at = ?, modified_at = ?
                WHERE id = ? AND status = ?
                RETURNING id, parent_id, depth, title, description, tags, priority, status, role, previous_role, role_changed_at, created_at, modified_at
                "#,
            )
            .bind(&t.new_status)
            .bind(t.new_role.to_string())
            .bind(&current_role)
            .bind(now)
            .bind(now)
            .bind(t.item_id)
            .bind(&t.expected_status)
            .fetch_optional(&mut *tx)
            .await
            .map_err(sqlx_error_to_work_item_error)?;

            let Some(row) = row else {
                return Err(WorkItemError::ConcurrencyExhausted);
            };
            let updated = row_to_item(&row)?;

            if current_role != t.new_role.to_string() {
                sqlx::query(
                    r#"
                    INSERT INTO role_transitions (item_id, from_role, to_role, from_status, to_status, trigger, applied_at, actor)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(t.item_id)
                .bind(&current_role)
                .bind(t.new_role.to_string())
                .bind(&t.expected_status)
                .bind(&t.new_status)
                .bind(t.trigger.to_string())
                .bind(now)
                .bind(&t.actor)
                .execute(&mut *tx)
                .await
                .map_err(sqlx_error_to_work_item_error)?;
            }

            results.push(updated);
        }

        tx.commit().await.map_err(sqlx_error_to_work_item_error)?;
        Ok(results)
    }

    async fn upsert_note(&self, note: UpsertNote) -> Result<Note> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM items WHERE id = ?)")
            .bind(note.item_id)
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_work_item_error)?;
        if !exists {
            return Err(WorkItemError::item_not_found(note.item_id));
        }

        let now = now();
        let row = sqlx::query(
            r#"
            INSERT INTO notes (item_id, key, phase, body, created_at, modified_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(item_id, key) DO UPDATE SET phase = excluded.phase, body = excluded.body, modified_at = excluded.modified_at
            RETURNING id, item_id, key, phase, body, created_at, modified_at
            "#,
        )
        .bind(note.item_id)
        .bind(&note.key)
        .bind(note.phase.to_string())
        .bind(&note.body)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_work_item_error)?;

        row_to_note(&row)
    }

    async fn delete_note(&self, item_id: i64, key: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM notes WHERE item_id = ? AND key = ?")
            .bind(item_id)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_work_item_error)?;

        if result.rows_affected() == 0 {
            return Err(WorkItemError::note_not_found(item_id, key));
        }
        Ok(())
    }

    async fn notes_by_item(&self, item_id: i64) -> Result<Vec<Note>> {
        let rows = sqlx::query(
            "SELECT id, item_id, key, phase, body, created_at, modified_at FROM notes WHERE item_id = ?",
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_work_item_error)?;

        rows.iter().map(row_to_note).collect()
    }

    async fn create_dependency(&self, dep: NewDependency) -> Result<Dependency> {
        if dep.from_item_id == dep.to_item_id {
            return Err(WorkItemError::self_dependency(dep.from_item_id));
        }

        let now = now();
        let row = sqlx::query(
            r#"
            INSERT INTO dependencies (from_id, to_id, type, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, from_id, to_id, type, created_at
            "#,
        )
        .bind(dep.from_item_id)
        .bind(dep.to_item_id)
        .bind(dep.dep_type.to_string())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.message().contains("UNIQUE constraint failed") => {
                WorkItemError::duplicate_dependency(dep.from_item_id, dep.to_item_id)
            }
            other => sqlx_error_to_work_item_error(other),
        })?;

        row_to_dependency(&row)
    }

    async fn delete_dependency(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM dependencies WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_work_item_error)?;

        if result.rows_affected() == 0 {
            return Err(WorkItemError::dependency_not_found(id));
        }
        Ok(())
    }

    async fn dependencies_by_from_item(&self, item_id: i64) -> Result<Vec<Dependency>> {
        let rows = sqlx::query("SELECT id, from_id, to_id, type, created_at FROM dependencies WHERE from_id = ?")
            .bind(item_id)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_work_item_error)?;

        rows.iter().map(row_to_dependency).collect()
    }

    async fn dependencies_by_to_item(&self, item_id: i64) -> Result<Vec<Dependency>> {
        let rows = sqlx::query("SELECT id, from_id, to_id, type, created_at FROM dependencies WHERE to_id = ?")
            .bind(item_id)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_work_item_error)?;

        rows.iter().map(row_to_dependency).collect()
    }

    async fn all_dependencies(&self) -> Result<Vec<Dependency>> {
        let rows = sqlx::query("SELECT id, from_id, to_id, type, created_at FROM dependencies")
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_work_item_error)?;

        rows.iter().map(row_to_dependency).collect()
    }

    async fn transitions_by_item(&self, item_id: i64) -> Result<Vec<RoleTransition>> {
        let rows = sqlx::query(
            "SELECT id, item_id, from_role, to_role, from_status, to_status, trigger, applied_at, actor FROM role_transitions WHERE item_id = ? ORDER BY id ASC",
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_work_item_error)?;

        rows.iter().map(row_to_transition).collect()
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_work_item_error)?;
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let (total_result, role_results, status_results, timestamp_result) = tokio::join!(
            sqlx::query("SELECT COUNT(*) as total FROM items").fetch_one(&self.pool),
            sqlx::query("SELECT role, COUNT(*) as count FROM items GROUP BY role").fetch_all(&self.pool),
            sqlx::query("SELECT status, COUNT(*) as count FROM items GROUP BY status").fetch_all(&self.pool),
            sqlx::query("SELECT MAX(created_at) as latest_created, MAX(role_changed_at) as latest_role_change FROM items")
                .fetch_one(&self.pool),
        );

        let total_result = total_result.map_err(sqlx_error_to_work_item_error)?;
        let role_results = role_results.map_err(sqlx_error_to_work_item_error)?;
        let status_results = status_results.map_err(sqlx_error_to_work_item_error)?;
        let timestamp_result = timestamp_result.map_err(sqlx_error_to_work_item_error)?;

        let total_items: i64 = total_result.get("total");

        let mut items_by_role = HashMap::new();
        for row in role_results {
            let role_str: String = row.get("role");
            let role: Role = role_str.parse()?;
            let count: i64 = row.get("count");
            items_by_role.insert(role, count as u64);
        }

        let mut items_by_status = HashMap::new();
        for row in status_results {
            let status: String = row.get("status");
            let count: i64 = row.get("count");
            items_by_status.insert(status, count as u64);
        }

        Ok(StoreStats {
            total_items: total_items as u64,
            items_by_role,
            items_by_status,
            latest_created: timestamp_result.get("latest_created"),
            latest_role_change: timestamp_result.get("latest_role_change"),
        })
    }
}
