use serde::{Deserialize, Serialize};

/// Reminder attached to a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Option<i64>,
    pub uuid: String,
    pub user_id: Option<i64>,
    pub task_id: i64,
    pub remind_ts: i64,
    pub email: Option<String>,
    pub created_ts: i64,
}

impl Reminder {
    pub fn new(task_id: i64, remind_ts: i64) -> Self {
        Self {
            id: None,
            uuid: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            task_id,
            remind_ts,
            email: None,
            created_ts: chrono::Utc::now().timestamp(),
        }
    }

    /// A reminder is active until its time has passed
    pub fn is_active(&self, now: i64) -> bool {
        self.remind_ts >= now
    }
}
