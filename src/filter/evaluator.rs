//! Filter expression evaluator
//!
//! Evaluation is pure: a task and the current time are enough to decide a match.
//! `due` comparisons work on local calendar days.

use crate::filter::parser::{ComparisonOp, DueValue, FilterTerm, StatusFilter};
use crate::models::Task;
use crate::utils::date::local_day;

#[derive(Debug, Clone)]
pub enum FilterExpr {
    All, // Match all
    Term(FilterTerm),
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Not(Box<FilterExpr>),
}

impl FilterExpr {
    /// Evaluate filter against a task
    pub fn matches(&self, task: &Task, now: i64) -> bool {
        match self {
            FilterExpr::All => true,
            FilterExpr::Term(term) => term.matches(task, now),
            FilterExpr::And(exprs) => exprs.iter().all(|e| e.matches(task, now)),
            FilterExpr::Or(exprs) => exprs.iter().any(|e| e.matches(task, now)),
            FilterExpr::Not(expr) => !expr.matches(task, now),
        }
    }

    /// Whether any term constrains completion status
    pub fn mentions_status(&self) -> bool {
        match self {
            FilterExpr::All => false,
            FilterExpr::Term(term) => matches!(term, FilterTerm::Status(_) | FilterTerm::Id(_)),
            FilterExpr::And(exprs) | FilterExpr::Or(exprs) => exprs.iter().any(|e| e.mentions_status()),
            FilterExpr::Not(expr) => expr.mentions_status(),
        }
    }
}

fn match_due(task_ts: Option<i64>, op: &ComparisonOp, value: &DueValue) -> bool {
    match value {
        DueValue::Any => match op {
            ComparisonOp::Neq => task_ts.is_none(),
            _ => task_ts.is_some(),
        },
        DueValue::None => match op {
            ComparisonOp::Neq => task_ts.is_some(),
            _ => task_ts.is_none(),
        },
        DueValue::Day(day) => {
            let Some(ts) = task_ts else {
                // Undated tasks differ from every date
                return *op == ComparisonOp::Neq;
            };
            let task_day = local_day(ts);
            match op {
                ComparisonOp::Eq => task_day == *day,
                ComparisonOp::Neq => task_day != *day,
                ComparisonOp::Gt => task_day > *day,
                ComparisonOp::Lt => task_day < *day,
                ComparisonOp::Gte => task_day >= *day,
                ComparisonOp::Lte => task_day <= *day,
            }
        }
    }
}

impl FilterTerm {
    fn matches(&self, task: &Task, now: i64) -> bool {
        match self {
            FilterTerm::Id(id) => task.id == Some(*id),
            FilterTerm::Priority(qs) => qs.contains(&task.priority),
            FilterTerm::Status(status) => match status {
                StatusFilter::Open => !task.completed,
                StatusFilter::Done => task.completed,
                StatusFilter::All => true,
            },
            FilterTerm::Due(op, value) => match_due(task.due_ts, op, value),
            FilterTerm::Type(types) => types.contains(&task.task_type),
            FilterTerm::Origin(origins) => origins.contains(&task.origin),
            FilterTerm::Title(needle) => {
                task.title.to_lowercase().contains(needle)
                    || task.notes.as_deref().map_or(false, |n| n.to_lowercase().contains(needle))
            }
            FilterTerm::Overdue => task.is_overdue(now),
            FilterTerm::Rolled => task.rollover_count > 0,
        }
    }
}

/// Keep tasks matching a filter expression
pub fn filter_tasks(tasks: Vec<Task>, filter: &FilterExpr, now: i64) -> Vec<Task> {
    tasks.into_iter().filter(|t| filter.matches(t, now)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse_filter;
    use crate::models::{Origin, Quadrant, TaskType};
    use crate::utils::date::parse_date_expr;

    fn task(id: i64, title: &str, priority: Quadrant) -> Task {
        let mut t = Task::new(title.to_string(), priority);
        t.id = Some(id);
        t
    }

    fn filter(tokens: &[&str]) -> FilterExpr {
        parse_filter(tokens.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    #[test]
    fn test_filter_id_and_priority() {
        let now = chrono::Utc::now().timestamp();
        let a = task(1, "a", Quadrant::UrgentImportant);
        let b = task(2, "b", Quadrant::Neither);
        assert!(filter(&["1"]).matches(&a, now));
        assert!(!filter(&["1"]).matches(&b, now));
        assert!(filter(&["priority=NUNI,UI"]).matches(&b, now));
        assert!(!filter(&["priority=UNI"]).matches(&a, now));
    }

    #[test]
    fn test_filter_status() {
        let now = chrono::Utc::now().timestamp();
        let mut t = task(1, "a", Quadrant::UrgentImportant);
        assert!(filter(&["status=open"]).matches(&t, now));
        t.completed = true;
        assert!(filter(&["status=done"]).matches(&t, now));
        assert!(filter(&["status=all"]).matches(&t, now));
        assert!(!filter(&["status=open"]).matches(&t, now));
    }

    #[test]
    fn test_filter_due_any_none_and_days() {
        let now = chrono::Utc::now().timestamp();
        let mut dated = task(1, "a", Quadrant::UrgentImportant);
        dated.due_ts = Some(parse_date_expr("tomorrow").unwrap());
        let undated = task(2, "b", Quadrant::UrgentImportant);

        assert!(filter(&["due=any"]).matches(&dated, now));
        assert!(filter(&["due=none"]).matches(&undated, now));
        assert!(filter(&["due!=none"]).matches(&dated, now));
        assert!(filter(&["due=tomorrow"]).matches(&dated, now));
        assert!(filter(&["due>today"]).matches(&dated, now));
        assert!(!filter(&["due<=today"]).matches(&dated, now));
        assert!(filter(&["due!=today"]).matches(&undated, now));
        assert!(!filter(&["due>today"]).matches(&undated, now));
    }

    #[test]
    fn test_filter_derived_terms() {
        let now = chrono::Utc::now().timestamp();
        let mut t = task(1, "Pay rent", Quadrant::UrgentImportant);
        t.due_ts = Some(now - 60);
        t.rollover_count = 2;
        t.origin = Origin::Ics;
        t.task_type = TaskType::Family;
        t.notes = Some("Landlord portal".to_string());

        assert!(filter(&["overdue", "rolled"]).matches(&t, now));
        assert!(filter(&["origin=ics", "type=family"]).matches(&t, now));
        assert!(filter(&["title=RENT"]).matches(&t, now));
        assert!(filter(&["title=portal"]).matches(&t, now));
        assert!(!filter(&["not", "overdue"]).matches(&t, now));
    }

    #[test]
    fn test_filter_tasks_combined() {
        let now = chrono::Utc::now().timestamp();
        let tasks = vec![
            task(1, "a", Quadrant::UrgentImportant),
            task(2, "b", Quadrant::Important),
            task(3, "c", Quadrant::Neither),
        ];
        let kept = filter_tasks(tasks, &filter(&["priority=UI", "or", "3"]), now);
        assert_eq!(kept.iter().filter_map(|t| t.id).collect::<Vec<_>>(), vec![1, 3]);
        assert!(filter(&["status=open"]).mentions_status());
        assert!(!filter(&["priority=UI"]).mentions_status());
    }
}
