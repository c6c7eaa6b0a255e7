use chrono::{Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

/// Eisenhower quadrant (urgency x importance)
///
/// - `UI`: urgent and important (do first)
/// - `UNI`: important, not urgent (schedule)
/// - `NUI`: urgent, not important (delegate)
/// - `NUNI`: neither urgent nor important (eliminate)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quadrant {
    #[serde(rename = "UI")]
    UrgentImportant,
    #[serde(rename = "UNI")]
    Important,
    #[serde(rename = "NUI")]
    Urgent,
    #[serde(rename = "NUNI")]
    Neither,
}

impl Quadrant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quadrant::UrgentImportant => "UI",
            Quadrant::Important => "UNI",
            Quadrant::Urgent => "NUI",
            Quadrant::Neither => "NUNI",
        }
    }

    /// Parse a quadrant code, a `q1`..`q4` shorthand or an action name
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ui" | "q1" | "do" => Some(Quadrant::UrgentImportant),
            "uni" | "q2" | "schedule" => Some(Quadrant::Important),
            "nui" | "q3" | "delegate" => Some(Quadrant::Urgent),
            "nuni" | "q4" | "eliminate" => Some(Quadrant::Neither),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Quadrant::UrgentImportant => "Urgent & Important",
            Quadrant::Important => "Important, Not Urgent",
            Quadrant::Urgent => "Urgent, Not Important",
            Quadrant::Neither => "Not Urgent & Not Important",
        }
    }

    /// Recommended action for tasks in this quadrant
    pub fn action(&self) -> &'static str {
        match self {
            Quadrant::UrgentImportant => "Do first",
            Quadrant::Important => "Schedule",
            Quadrant::Urgent => "Delegate",
            Quadrant::Neither => "Eliminate",
        }
    }

    pub fn is_urgent(&self) -> bool {
        matches!(self, Quadrant::UrgentImportant | Quadrant::Urgent)
    }

    pub fn is_important(&self) -> bool {
        matches!(self, Quadrant::UrgentImportant | Quadrant::Important)
    }

    /// All quadrants in matrix reading order
    pub fn all() -> [Quadrant; 4] {
        [
            Quadrant::UrgentImportant,
            Quadrant::Important,
            Quadrant::Urgent,
            Quadrant::Neither,
        ]
    }
}

/// Where a task came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Manual,
    Ics,
    Gcal,
    Apple,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Manual => "manual",
            Origin::Ics => "ics",
            Origin::Gcal => "gcal",
            Origin::Apple => "apple",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(Origin::Manual),
            "ics" => Some(Origin::Ics),
            "gcal" => Some(Origin::Gcal),
            "apple" => Some(Origin::Apple),
            _ => None,
        }
    }
}

/// Task category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    #[default]
    Work,
    Personal,
    Health,
    Learning,
    Family,
    Other,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Work => "work",
            TaskType::Personal => "personal",
            TaskType::Health => "health",
            TaskType::Learning => "learning",
            TaskType::Family => "family",
            TaskType::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "work" => Some(TaskType::Work),
            "personal" => Some(TaskType::Personal),
            "health" => Some(TaskType::Health),
            "learning" => Some(TaskType::Learning),
            "family" => Some(TaskType::Family),
            "other" => Some(TaskType::Other),
            _ => None,
        }
    }

    pub const NAMES: &'static [&'static str] =
        &["work", "personal", "health", "learning", "family", "other"];
}

/// Task model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Option<i64>,
    pub uuid: String,
    pub user_id: Option<i64>,
    pub title: String,
    pub notes: Option<String>,
    pub priority: Quadrant,
    pub due_ts: Option<i64>,
    pub completed: bool,
    pub completed_ts: Option<i64>,
    pub origin: Origin,
    pub source_event_id: Option<String>,
    pub rollover_count: i64,
    #[serde(default)]
    pub task_type: TaskType,
    pub created_ts: i64,
    pub modified_ts: i64,
}

impl Task {
    /// Create a new task
    pub fn new(title: String, priority: Quadrant) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: None,
            uuid: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            title,
            notes: None,
            priority,
            due_ts: None,
            completed: false,
            completed_ts: None,
            origin: Origin::Manual,
            source_event_id: None,
            rollover_count: 0,
            task_type: TaskType::default(),
            created_ts: now,
            modified_ts: now,
        }
    }

    /// Incomplete with a due time already passed
    pub fn is_overdue(&self, now: i64) -> bool {
        !self.completed && self.due_ts.map_or(false, |due| due < now)
    }

    /// Check if the task is due on the given local calendar day
    pub fn is_due_on(&self, day: NaiveDate) -> bool {
        self.due_ts
            .and_then(|ts| Local.timestamp_opt(ts, 0).single())
            .map_or(false, |dt| dt.date_naive() == day)
    }
}
