use rusqlite::{Connection, OptionalExtension, Row};
use crate::models::{Origin, Quadrant, Task, TaskType};
use crate::repo::Scope;
use anyhow::{anyhow, Context, Result};

const TASK_COLUMNS: &str = "id, uuid, user_id, title, notes, priority, due_ts, completed, completed_ts,
    origin, source_event_id, rollover_count, task_type, created_ts, modified_ts";

/// Open tasks first, then by due date (undated last), then by id
const TASK_ORDER: &str = "ORDER BY completed, due_ts IS NULL, due_ts, id";

/// Fields for a new task
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub notes: Option<String>,
    pub priority: Quadrant,
    pub due_ts: Option<i64>,
    pub origin: Origin,
    pub source_event_id: Option<String>,
    pub task_type: TaskType,
}

impl NewTask {
    pub fn new(title: impl Into<String>, priority: Quadrant) -> Self {
        Self {
            title: title.into(),
            notes: None,
            priority,
            due_ts: None,
            origin: Origin::Manual,
            source_event_id: None,
            task_type: TaskType::default(),
        }
    }
}

/// Partial update; `Some(None)` clears an optional field
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub notes: Option<Option<String>>,
    pub priority: Option<Quadrant>,
    pub due_ts: Option<Option<i64>>,
    pub task_type: Option<TaskType>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.notes.is_none()
            && self.priority.is_none()
            && self.due_ts.is_none()
            && self.task_type.is_none()
    }
}

fn task_from_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: Some(row.get(0)?),
        uuid: row.get(1)?,
        user_id: row.get(2)?,
        title: row.get(3)?,
        notes: row.get(4)?,
        priority: Quadrant::from_str(&row.get::<_, String>(5)?)
            .unwrap_or(Quadrant::Important),
        due_ts: row.get(6)?,
        completed: row.get(7)?,
        completed_ts: row.get(8)?,
        origin: Origin::from_str(&row.get::<_, String>(9)?).unwrap_or(Origin::Manual),
        source_event_id: row.get(10)?,
        rollover_count: row.get(11)?,
        task_type: TaskType::from_str(&row.get::<_, String>(12)?).unwrap_or_default(),
        created_ts: row.get(13)?,
        modified_ts: row.get(14)?,
    })
}

/// Task repository for database operations
pub struct TaskRepo;

impl TaskRepo {
    /// Create a new task owned by `scope`
    pub fn create(conn: &Connection, scope: Scope, new: NewTask) -> Result<Task> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(anyhow!("Task title cannot be empty"));
        }
        let mut task = Task::new(title.to_string(), new.priority);
        task.user_id = scope.user_id;
        task.notes = new.notes.filter(|n| !n.trim().is_empty());
        task.due_ts = new.due_ts;
        task.origin = new.origin;
        task.source_event_id = new.source_event_id;
        task.task_type = new.task_type;

        let id = Self::insert(conn, &task)
            .with_context(|| format!("Failed to create task: {}", task.title))?;
        log::debug!("Created task {} ({})", id, task.priority.as_str());
        Ok(Task { id: Some(id), ..task })
    }

    /// Insert a fully-formed task row, keeping its uuid and timestamps
    pub fn insert(conn: &Connection, task: &Task) -> Result<i64> {
        conn.execute(
            "INSERT INTO tasks (uuid, user_id, title, notes, priority, due_ts, completed, completed_ts,
                    origin, source_event_id, rollover_count, task_type, created_ts, modified_ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            rusqlite::params![
                task.uuid,
                task.user_id,
                task.title,
                task.notes,
                task.priority.as_str(),
                task.due_ts,
                task.completed,
                task.completed_ts,
                task.origin.as_str(),
                task.source_event_id,
                task.rollover_count,
                task.task_type.as_str(),
                task.created_ts,
                task.modified_ts,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get task by ID within a scope
    pub fn get_by_id(conn: &Connection, scope: Scope, id: i64) -> Result<Option<Task>> {
        let sql = format!("SELECT {} FROM tasks WHERE id = ?1 AND user_id IS ?2", TASK_COLUMNS);
        let task = conn
            .query_row(&sql, rusqlite::params![id, scope.user_id], task_from_row)
            .optional()?;
        Ok(task)
    }

    fn query(conn: &Connection, where_clause: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<Task>> {
        let sql = format!("SELECT {} FROM tasks WHERE {} {}", TASK_COLUMNS, where_clause, TASK_ORDER);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params, task_from_row)?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?);
        }
        Ok(tasks)
    }

    /// List every task in a scope
    pub fn list(conn: &Connection, scope: Scope) -> Result<Vec<Task>> {
        Self::query(conn, "user_id IS ?1", &[&scope.user_id])
    }

    /// Incomplete tasks whose due time has passed
    pub fn overdue(conn: &Connection, scope: Scope, now: i64) -> Result<Vec<Task>> {
        Self::query(
            conn,
            "user_id IS ?1 AND completed = 0 AND due_ts IS NOT NULL AND due_ts < ?2",
            &[&scope.user_id, &now],
        )
    }

    /// Apply a patch and return the updated task
    pub fn update(conn: &Connection, id: i64, patch: &TaskPatch) -> Result<Task> {
        let mut task = Self::get_unscoped(conn, id)?
            .ok_or_else(|| anyhow!("Task {} not found", id))?;

        if let Some(title) = &patch.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(anyhow!("Task title cannot be empty"));
            }
            task.title = title.to_string();
        }
        if let Some(notes) = &patch.notes {
            task.notes = notes.clone().filter(|n| !n.trim().is_empty());
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(due_ts) = patch.due_ts {
            task.due_ts = due_ts;
        }
        if let Some(task_type) = patch.task_type {
            task.task_type = task_type;
        }
        task.modified_ts = chrono::Utc::now().timestamp();

        conn.execute(
            "UPDATE tasks SET title = ?1, notes = ?2, priority = ?3, due_ts = ?4, task_type = ?5,
                    modified_ts = ?6
             WHERE id = ?7",
            rusqlite::params![
                task.title,
                task.notes,
                task.priority.as_str(),
                task.due_ts,
                task.task_type.as_str(),
                task.modified_ts,
                id,
            ],
        )
        .with_context(|| format!("Failed to update task {}", id))?;
        log::debug!("Updated task {}", id);
        Ok(task)
    }

    fn get_unscoped(conn: &Connection, id: i64) -> Result<Option<Task>> {
        let sql = format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS);
        Ok(conn.query_row(&sql, [id], task_from_row).optional()?)
    }

    /// Mark a task completed (stamping completion time) or reopen it
    pub fn mark_done(conn: &Connection, id: i64, done: bool) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let completed_ts = if done { Some(now) } else { None };
        let changed = conn.execute(
            "UPDATE tasks SET completed = ?1, completed_ts = ?2, modified_ts = ?3 WHERE id = ?4",
            rusqlite::params![done, completed_ts, now, id],
        )?;
        if changed == 0 {
            return Err(anyhow!("Task {} not found", id));
        }
        log::debug!("Task {} completed={}", id, done);
        Ok(())
    }

    /// Move a task to another quadrant
    pub fn move_priority(conn: &Connection, id: i64, priority: Quadrant) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let changed = conn.execute(
            "UPDATE tasks SET priority = ?1, modified_ts = ?2 WHERE id = ?3",
            rusqlite::params![priority.as_str(), now, id],
        )?;
        if changed == 0 {
            return Err(anyhow!("Task {} not found", id));
        }
        Ok(())
    }

    /// Delete a task (reminders cascade)
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM tasks WHERE id = ?1", [id])
            .with_context(|| format!("Failed to delete task {}", id))?;
        log::debug!("Deleted task {}", id);
        Ok(())
    }

    /// Delete every task in a scope, returning how many were removed
    pub fn delete_all(conn: &Connection, scope: Scope) -> Result<usize> {
        let count = conn.execute("DELETE FROM tasks WHERE user_id IS ?1", [scope.user_id])?;
        log::debug!("Deleted {} tasks", count);
        Ok(count)
    }

    /// Replace every task in a scope with `tasks` inside one transaction
    ///
    /// Returns `(uuid, new id)` pairs so callers can re-link reminders.
    pub fn replace_all(conn: &Connection, scope: Scope, tasks: &[Task]) -> Result<Vec<(String, i64)>> {
        let tx = conn.unchecked_transaction()?;
        let ids = Self::replace_all_in(&tx, scope, tasks)?;
        tx.commit()?;
        Ok(ids)
    }

    /// `replace_all` body for callers that already hold a transaction
    pub fn replace_all_in(conn: &Connection, scope: Scope, tasks: &[Task]) -> Result<Vec<(String, i64)>> {
        Self::delete_all(conn, scope)?;
        let mut ids = Vec::with_capacity(tasks.len());
        for task in tasks {
            let mut row = Task {
                id: None,
                user_id: scope.user_id,
                ..task.clone()
            };
            // uuids are ledger-wide; another scope may already hold this one
            if Self::uuid_taken(conn, &row.uuid)? {
                row.uuid = uuid::Uuid::new_v4().to_string();
                log::debug!("Task uuid {} in use, restoring as {}", task.uuid, row.uuid);
            }
            let id = Self::insert(conn, &row)
                .with_context(|| format!("Failed to restore task: {}", task.title))?;
            ids.push((task.uuid.clone(), id));
        }
        Ok(ids)
    }

    fn uuid_taken(conn: &Connection, uuid: &str) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE uuid = ?1",
            [uuid],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Whether an event UID has already been imported into this scope
    pub fn exists_source_event(conn: &Connection, scope: Scope, uid: &str) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE user_id IS ?1 AND source_event_id = ?2",
            rusqlite::params![scope.user_id, uid],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Set a rolled-over due date and bump the rollover counter
    pub fn apply_rollover(conn: &Connection, id: i64, new_due: i64) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "UPDATE tasks SET due_ts = ?1, rollover_count = rollover_count + 1, modified_ts = ?2
             WHERE id = ?3",
            rusqlite::params![new_due, now, id],
        )?;
        Ok(())
    }

    /// Count tasks owned by a user (total, completed)
    pub fn counts_for_user(conn: &Connection, user_id: i64) -> Result<(i64, i64)> {
        let counts = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(completed), 0) FROM tasks WHERE user_id = ?1",
            [user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;

    #[test]
    fn test_create_and_get() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let scope = Scope::anonymous();
        let mut new = NewTask::new("  Plan sprint ", Quadrant::Important);
        new.notes = Some("".to_string());
        let task = TaskRepo::create(&conn, scope, new).unwrap();

        let loaded = TaskRepo::get_by_id(&conn, scope, task.id.unwrap()).unwrap().unwrap();
        assert_eq!(loaded.title, "Plan sprint");
        assert_eq!(loaded.priority, Quadrant::Important);
        assert!(loaded.notes.is_none());
        assert_eq!(loaded.uuid, task.uuid);
    }

    #[test]
    fn test_create_rejects_empty_title() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let result = TaskRepo::create(&conn, Scope::anonymous(), NewTask::new("   ", Quadrant::UrgentImportant));
        assert!(result.is_err());
    }

    #[test]
    fn test_scoping_isolates_users() {
        let conn = DbConnection::connect_in_memory().unwrap();
        conn.execute(
            "INSERT INTO users (uuid, name, email, password_hash, role, status, joined_ts)
             VALUES ('u1', 'A', 'a@x.io', 'h', 'user', 'active', 0)",
            [],
        ).unwrap();
        let user = Scope::user(conn.last_insert_rowid());

        let anon_task = TaskRepo::create(&conn, Scope::anonymous(), NewTask::new("anon", Quadrant::Neither)).unwrap();
        TaskRepo::create(&conn, user, NewTask::new("mine", Quadrant::Urgent)).unwrap();

        assert_eq!(TaskRepo::list(&conn, Scope::anonymous()).unwrap().len(), 1);
        assert_eq!(TaskRepo::list(&conn, user).unwrap()[0].title, "mine");
        assert!(TaskRepo::get_by_id(&conn, user, anon_task.id.unwrap()).unwrap().is_none());
    }

    #[test]
    fn test_replace_all_into_second_scope_keeps_original_rows() {
        let conn = DbConnection::connect_in_memory().unwrap();
        conn.execute(
            "INSERT INTO users (uuid, name, email, password_hash, role, status, joined_ts)
             VALUES ('u1', 'A', 'a@x.io', 'h', 'user', 'active', 0)",
            [],
        ).unwrap();
        let user = Scope::user(conn.last_insert_rowid());
        let anon = TaskRepo::create(&conn, Scope::anonymous(), NewTask::new("anon task", Quadrant::Urgent)).unwrap();

        let ids = TaskRepo::replace_all(&conn, user, &[anon.clone()]).unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].0, anon.uuid);

        let copied = TaskRepo::get_by_id(&conn, user, ids[0].1).unwrap().unwrap();
        assert_eq!(copied.title, "anon task");
        assert_ne!(copied.uuid, anon.uuid);
        assert_eq!(TaskRepo::list(&conn, Scope::anonymous()).unwrap()[0].uuid, anon.uuid);

        // Restoring again into the same scope reuses its own uuid slot
        let again = TaskRepo::replace_all(&conn, user, &[copied.clone()]).unwrap();
        let reloaded = TaskRepo::get_by_id(&conn, user, again[0].1).unwrap().unwrap();
        assert_eq!(reloaded.uuid, copied.uuid);
    }

    #[test]
    fn test_update_patch() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let mut new = NewTask::new("Task", Quadrant::UrgentImportant);
        new.due_ts = Some(1000);
        let task = TaskRepo::create(&conn, Scope::anonymous(), new).unwrap();

        let patch = TaskPatch {
            notes: Some(Some("details".to_string())),
            due_ts: Some(None),
            task_type: Some(TaskType::Health),
            ..Default::default()
        };
        let updated = TaskRepo::update(&conn, task.id.unwrap(), &patch).unwrap();
        assert_eq!(updated.notes.as_deref(), Some("details"));
        assert!(updated.due_ts.is_none());
        assert_eq!(updated.task_type, TaskType::Health);
        assert_eq!(updated.title, "Task");
    }

    #[test]
    fn test_mark_done_sets_and_clears_timestamp() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let scope = Scope::anonymous();
        let task = TaskRepo::create(&conn, scope, NewTask::new("Task", Quadrant::UrgentImportant)).unwrap();
        let id = task.id.unwrap();

        TaskRepo::mark_done(&conn, id, true).unwrap();
        let done = TaskRepo::get_by_id(&conn, scope, id).unwrap().unwrap();
        assert!(done.completed);
        assert!(done.completed_ts.is_some());

        TaskRepo::mark_done(&conn, id, false).unwrap();
        let reopened = TaskRepo::get_by_id(&conn, scope, id).unwrap().unwrap();
        assert!(!reopened.completed);
        assert!(reopened.completed_ts.is_none());

        assert!(TaskRepo::mark_done(&conn, 999, true).is_err());
    }

    #[test]
    fn test_list_order_and_overdue() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let scope = Scope::anonymous();
        let now = 10_000;
        let mut late = NewTask::new("late", Quadrant::UrgentImportant);
        late.due_ts = Some(now - 10);
        let mut soon = NewTask::new("soon", Quadrant::Urgent);
        soon.due_ts = Some(now + 10);
        TaskRepo::create(&conn, scope, NewTask::new("undated", Quadrant::Neither)).unwrap();
        TaskRepo::create(&conn, scope, soon).unwrap();
        TaskRepo::create(&conn, scope, late).unwrap();

        let titles: Vec<String> = TaskRepo::list(&conn, scope).unwrap().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["late", "soon", "undated"]);

        let overdue = TaskRepo::overdue(&conn, scope, now).unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].title, "late");
    }

    #[test]
    fn test_replace_all_and_source_events() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let scope = Scope::anonymous();
        TaskRepo::create(&conn, scope, NewTask::new("old", Quadrant::UrgentImportant)).unwrap();

        let mut imported = Task::new("meeting".to_string(), Quadrant::Important);
        imported.origin = Origin::Ics;
        imported.source_event_id = Some("evt-1".to_string());
        let ids = TaskRepo::replace_all(&conn, scope, &[imported.clone()]).unwrap();

        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].0, imported.uuid);
        let tasks = TaskRepo::list(&conn, scope).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "meeting");
        assert!(TaskRepo::exists_source_event(&conn, scope, "evt-1").unwrap());
        assert!(!TaskRepo::exists_source_event(&conn, scope, "evt-2").unwrap());
    }

    #[test]
    fn test_apply_rollover_increments_counter() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let scope = Scope::anonymous();
        let task = TaskRepo::create(&conn, scope, NewTask::new("t", Quadrant::UrgentImportant)).unwrap();
        let id = task.id.unwrap();
        TaskRepo::apply_rollover(&conn, id, 5000).unwrap();
        TaskRepo::apply_rollover(&conn, id, 6000).unwrap();
        let loaded = TaskRepo::get_by_id(&conn, scope, id).unwrap().unwrap();
        assert_eq!(loaded.rollover_count, 2);
        assert_eq!(loaded.due_ts, Some(6000));
    }
}
