use rusqlite::{Connection, OptionalExtension, Row};
use crate::models::Reminder;
use crate::repo::Scope;
use anyhow::{anyhow, Context, Result};

const REMINDER_COLUMNS: &str = "id, uuid, user_id, task_id, remind_ts, email, created_ts";

fn reminder_from_row(row: &Row) -> rusqlite::Result<Reminder> {
    Ok(Reminder {
        id: Some(row.get(0)?),
        uuid: row.get(1)?,
        user_id: row.get(2)?,
        task_id: row.get(3)?,
        remind_ts: row.get(4)?,
        email: row.get(5)?,
        created_ts: row.get(6)?,
    })
}

pub struct ReminderRepo;

impl ReminderRepo {
    /// Create a reminder for a task in the given scope
    pub fn create(
        conn: &Connection,
        scope: Scope,
        task_id: i64,
        remind_ts: i64,
        email: Option<String>,
    ) -> Result<Reminder> {
        let mut reminder = Reminder::new(task_id, remind_ts);
        reminder.user_id = scope.user_id;
        reminder.email = email;
        let id = Self::insert(conn, &reminder)
            .with_context(|| format!("Failed to create reminder for task {}", task_id))?;
        log::debug!("Created reminder {} for task {}", id, task_id);
        Ok(Reminder { id: Some(id), ..reminder })
    }

    pub fn insert(conn: &Connection, reminder: &Reminder) -> Result<i64> {
        conn.execute(
            "INSERT INTO reminders (uuid, user_id, task_id, remind_ts, email, created_ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                reminder.uuid,
                reminder.user_id,
                reminder.task_id,
                reminder.remind_ts,
                reminder.email,
                reminder.created_ts,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_by_id(conn: &Connection, scope: Scope, id: i64) -> Result<Option<Reminder>> {
        let sql = format!(
            "SELECT {} FROM reminders WHERE id = ?1 AND user_id IS ?2",
            REMINDER_COLUMNS
        );
        Ok(conn
            .query_row(&sql, rusqlite::params![id, scope.user_id], reminder_from_row)
            .optional()?)
    }

    fn query(conn: &Connection, where_clause: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<Reminder>> {
        let sql = format!(
            "SELECT {} FROM reminders WHERE {} ORDER BY remind_ts, id",
            REMINDER_COLUMNS, where_clause
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params, reminder_from_row)?;
        let mut reminders = Vec::new();
        for row in rows {
            reminders.push(row?);
        }
        Ok(reminders)
    }

    pub fn list(conn: &Connection, scope: Scope) -> Result<Vec<Reminder>> {
        Self::query(conn, "user_id IS ?1", &[&scope.user_id])
    }

    pub fn list_for_task(conn: &Connection, task_id: i64) -> Result<Vec<Reminder>> {
        Self::query(conn, "task_id = ?1", &[&task_id])
    }

    /// Reminders with `from <= remind_ts < to`
    pub fn due_between(conn: &Connection, scope: Scope, from: i64, to: i64) -> Result<Vec<Reminder>> {
        Self::query(
            conn,
            "user_id IS ?1 AND remind_ts >= ?2 AND remind_ts < ?3",
            &[&scope.user_id, &from, &to],
        )
    }

    /// Change time and/or email; `Some(None)` clears the email
    pub fn update(
        conn: &Connection,
        id: i64,
        remind_ts: Option<i64>,
        email: Option<Option<String>>,
    ) -> Result<()> {
        if let Some(ts) = remind_ts {
            conn.execute(
                "UPDATE reminders SET remind_ts = ?1 WHERE id = ?2",
                rusqlite::params![ts, id],
            )?;
        }
        if let Some(email) = email {
            conn.execute(
                "UPDATE reminders SET email = ?1 WHERE id = ?2",
                rusqlite::params![email, id],
            )?;
        }
        let exists: i64 = conn.query_row("SELECT COUNT(*) FROM reminders WHERE id = ?1", [id], |row| row.get(0))?;
        if exists == 0 {
            return Err(anyhow!("Reminder {} not found", id));
        }
        Ok(())
    }

    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM reminders WHERE id = ?1", [id])
            .with_context(|| format!("Failed to delete reminder {}", id))?;
        Ok(())
    }

    /// Replace every reminder in a scope inside one transaction
    pub fn replace_all(conn: &Connection, scope: Scope, reminders: &[Reminder]) -> Result<usize> {
        let tx = conn.unchecked_transaction()?;
        let count = Self::replace_all_in(&tx, scope, reminders)?;
        tx.commit()?;
        Ok(count)
    }

    /// `replace_all` body for callers that already hold a transaction
    pub fn replace_all_in(conn: &Connection, scope: Scope, reminders: &[Reminder]) -> Result<usize> {
        conn.execute("DELETE FROM reminders WHERE user_id IS ?1", [scope.user_id])?;
        for reminder in reminders {
            let mut row = Reminder {
                id: None,
                user_id: scope.user_id,
                ..reminder.clone()
            };
            let taken: i64 = conn.query_row(
                "SELECT COUNT(*) FROM reminders WHERE uuid = ?1",
                [&row.uuid],
                |r| r.get(0),
            )?;
            if taken > 0 {
                row.uuid = uuid::Uuid::new_v4().to_string();
            }
            Self::insert(conn, &row)
                .with_context(|| format!("Failed to restore reminder {}", reminder.uuid))?;
        }
        Ok(reminders.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;
    use crate::models::Quadrant;
    use crate::repo::{NewTask, TaskRepo};

    fn setup() -> (Connection, i64) {
        let conn = DbConnection::connect_in_memory().unwrap();
        let task = TaskRepo::create(&conn, Scope::anonymous(), NewTask::new("Task", Quadrant::UrgentImportant)).unwrap();
        (conn, task.id.unwrap())
    }

    #[test]
    fn test_create_and_list() {
        let (conn, task_id) = setup();
        let scope = Scope::anonymous();
        ReminderRepo::create(&conn, scope, task_id, 2000, None).unwrap();
        ReminderRepo::create(&conn, scope, task_id, 1000, Some("a@x.io".to_string())).unwrap();

        let reminders = ReminderRepo::list(&conn, scope).unwrap();
        assert_eq!(reminders.len(), 2);
        assert_eq!(reminders[0].remind_ts, 1000);
        assert_eq!(reminders[0].email.as_deref(), Some("a@x.io"));
        assert_eq!(ReminderRepo::list_for_task(&conn, task_id).unwrap().len(), 2);
    }

    #[test]
    fn test_due_between_is_half_open() {
        let (conn, task_id) = setup();
        let scope = Scope::anonymous();
        for ts in [100, 200, 300] {
            ReminderRepo::create(&conn, scope, task_id, ts, None).unwrap();
        }
        let due = ReminderRepo::due_between(&conn, scope, 100, 300).unwrap();
        assert_eq!(due.iter().map(|r| r.remind_ts).collect::<Vec<_>>(), vec![100, 200]);
    }

    #[test]
    fn test_update_and_delete() {
        let (conn, task_id) = setup();
        let scope = Scope::anonymous();
        let reminder = ReminderRepo::create(&conn, scope, task_id, 100, Some("a@x.io".to_string())).unwrap();
        let id = reminder.id.unwrap();

        ReminderRepo::update(&conn, id, Some(500), Some(None)).unwrap();
        let loaded = ReminderRepo::get_by_id(&conn, scope, id).unwrap().unwrap();
        assert_eq!(loaded.remind_ts, 500);
        assert!(loaded.email.is_none());

        ReminderRepo::delete(&conn, id).unwrap();
        assert!(ReminderRepo::get_by_id(&conn, scope, id).unwrap().is_none());
        assert!(ReminderRepo::update(&conn, id, Some(1), None).is_err());
    }

    #[test]
    fn test_deleting_task_removes_reminders() {
        let (conn, task_id) = setup();
        ReminderRepo::create(&conn, Scope::anonymous(), task_id, 100, None).unwrap();
        TaskRepo::delete(&conn, task_id).unwrap();
        assert!(ReminderRepo::list(&conn, Scope::anonymous()).unwrap().is_empty());
    }
}
