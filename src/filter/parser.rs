//! Filter parser for task queries
//!
//! Implements boolean expression parsing with AND/OR/NOT operators.
//!
//! # Grammar
//!
//! ```text
//! filter := term | filter "or" term | "not" term
//! term := id | priority=<q>[,<q>] | status=<open|done|all> | due<op><expr>
//!       | type=<type> | origin=<origin> | title=<text> | overdue | rolled
//! ```
//!
//! # Precedence
//!
//! 1. `not` (highest)
//! 2. Implicit `and` (between adjacent terms)
//! 3. `or` (lowest)
//!
//! # Examples
//!
//! ```text
//! priority=UI,UNI status=open
//! overdue or due=today
//! not type=work
//! due>=tomorrow due<=fri
//! ```

use chrono::{DateTime, Local, NaiveDate};
use crate::filter::evaluator::FilterExpr;
use crate::models::{Origin, Quadrant, TaskType};
use crate::utils::date::parse_day_expr_at;

/// Comparison operators for filter expressions
#[derive(Debug, Clone, PartialEq)]
pub enum ComparisonOp {
    Eq,    // =
    Neq,   // != or <>
    Gt,    // >
    Lt,    // <
    Gte,   // >=
    Lte,   // <=
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Open,
    Done,
    All,
}

/// Right-hand side of a `due` comparison, resolved to a local day
#[derive(Debug, Clone, PartialEq)]
pub enum DueValue {
    Any,
    None,
    Day(NaiveDate),
}

#[derive(Debug, Clone)]
pub enum FilterTerm {
    Id(i64),
    Priority(Vec<Quadrant>),
    Status(StatusFilter),
    Due(ComparisonOp, DueValue),
    Type(Vec<TaskType>),
    Origin(Vec<Origin>),
    Title(String), // Case-insensitive substring
    Overdue,
    Rolled,
}

#[derive(Debug, Clone)]
enum FilterToken {
    Term(FilterTerm),
    Not,
    Or,
}

/// Known filter keys (exact match only)
const FILTER_KEYS: &[&str] = &["id", "priority", "status", "due", "type", "origin", "title"];

/// Parse filter tokens into a FilterExpr, resolving dates against the current time
///
/// # Example
///
/// ```
/// use focus_matrix::filter::parse_filter;
///
/// let filter = parse_filter(vec!["priority=UI".to_string(), "overdue".to_string()]).unwrap();
/// ```
pub fn parse_filter(tokens: Vec<String>) -> Result<FilterExpr, String> {
    parse_filter_at(tokens, Local::now())
}

/// Parse filter tokens, resolving date expressions against `now`
pub fn parse_filter_at(tokens: Vec<String>, now: DateTime<Local>) -> Result<FilterExpr, String> {
    if tokens.is_empty() {
        return Ok(FilterExpr::All);
    }

    let mut parsed: Vec<FilterToken> = Vec::new();
    for token in &tokens {
        match token.to_lowercase().as_str() {
            "or" => parsed.push(FilterToken::Or),
            "not" => parsed.push(FilterToken::Not),
            _ => parsed.push(FilterToken::Term(parse_filter_term(token, now)?)),
        }
    }

    // Precedence: not > and > or
    build_expression(parsed)
}

/// Split a token into (key, operator, value) using operator detection.
/// Returns None if no operator is found.
fn split_on_operator(token: &str) -> Option<(String, ComparisonOp, String)> {
    let op_start = token.find(|c: char| c == '=' || c == '>' || c == '<' || c == '!')?;

    let key = token[..op_start].to_string();
    if key.is_empty() {
        return None;
    }

    let rest = &token[op_start..];
    let (op, op_len) = if rest.starts_with(">=") {
        (ComparisonOp::Gte, 2)
    } else if rest.starts_with("<=") {
        (ComparisonOp::Lte, 2)
    } else if rest.starts_with("!=") || rest.starts_with("<>") {
        (ComparisonOp::Neq, 2)
    } else if rest.starts_with('=') {
        (ComparisonOp::Eq, 1)
    } else if rest.starts_with('>') {
        (ComparisonOp::Gt, 1)
    } else if rest.starts_with('<') {
        (ComparisonOp::Lt, 1)
    } else {
        return None;
    };

    Some((key, op, rest[op_len..].to_string()))
}

fn parse_list<T>(key: &str, value: &str, parse: impl Fn(&str) -> Option<T>) -> Result<Vec<T>, String> {
    value
        .split(',')
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| parse(v).ok_or_else(|| format!("Invalid {} value '{}'", key, v)))
        .collect::<Result<Vec<T>, String>>()
        .and_then(|values| {
            if values.is_empty() {
                Err(format!("Filter '{}' needs a value", key))
            } else {
                Ok(values)
            }
        })
}

/// Parse a single filter term token
fn parse_filter_term(token: &str, now: DateTime<Local>) -> Result<FilterTerm, String> {
    if let Ok(id) = token.parse::<i64>() {
        return Ok(FilterTerm::Id(id));
    }

    match token.to_lowercase().as_str() {
        "overdue" => return Ok(FilterTerm::Overdue),
        "rolled" => return Ok(FilterTerm::Rolled),
        _ => {}
    }

    let (key, op, value) = split_on_operator(token)
        .ok_or_else(|| format!("Invalid filter token: {}", token))?;
    let key_lower = key.to_lowercase();

    if !FILTER_KEYS.contains(&key_lower.as_str()) {
        return Err(format!("Unknown filter field '{}'. Known fields: {}", key, FILTER_KEYS.join(", ")));
    }
    if key_lower != "due" && op != ComparisonOp::Eq {
        return Err(format!(
            "Filter '{}' only supports the '=' operator, got '{}'",
            key_lower,
            format_op(&op)
        ));
    }

    match key_lower.as_str() {
        "id" => value
            .parse::<i64>()
            .map(FilterTerm::Id)
            .map_err(|_| format!("Invalid task id '{}'", value)),
        "priority" => parse_list("priority", &value, Quadrant::from_str).map(FilterTerm::Priority),
        "status" => match value.to_lowercase().as_str() {
            "open" | "pending" => Ok(FilterTerm::Status(StatusFilter::Open)),
            "done" | "completed" => Ok(FilterTerm::Status(StatusFilter::Done)),
            "all" => Ok(FilterTerm::Status(StatusFilter::All)),
            _ => Err(format!("Invalid status '{}'. Use open, done or all", value)),
        },
        "due" => {
            let due = match value.to_lowercase().as_str() {
                "any" => DueValue::Any,
                "none" => DueValue::None,
                _ => DueValue::Day(parse_day_expr_at(&value, now).map_err(|e| e.to_string())?),
            };
            if matches!(due, DueValue::Any | DueValue::None)
                && !matches!(op, ComparisonOp::Eq | ComparisonOp::Neq)
            {
                return Err(format!("'due{}{}' is not a valid comparison", format_op(&op), value));
            }
            Ok(FilterTerm::Due(op, due))
        }
        "type" => parse_list("type", &value, TaskType::from_str).map(FilterTerm::Type),
        "origin" => parse_list("origin", &value, |v| Origin::from_str(&v.to_lowercase())).map(FilterTerm::Origin),
        "title" => {
            if value.trim().is_empty() {
                Err("Filter 'title' needs a value".to_string())
            } else {
                Ok(FilterTerm::Title(value.to_lowercase()))
            }
        }
        _ => Err(format!("Invalid filter token: {}", token)),
    }
}

/// Format a ComparisonOp for display
fn format_op(op: &ComparisonOp) -> &'static str {
    match op {
        ComparisonOp::Eq => "=",
        ComparisonOp::Neq => "!=",
        ComparisonOp::Gt => ">",
        ComparisonOp::Lt => "<",
        ComparisonOp::Gte => ">=",
        ComparisonOp::Lte => "<=",
    }
}

/// Build expression tree from parsed tokens
fn build_expression(tokens: Vec<FilterToken>) -> Result<FilterExpr, String> {
    // Split by OR into AND groups
    let mut or_groups: Vec<Vec<FilterToken>> = Vec::new();
    let mut current_group = Vec::new();
    for token in tokens {
        if let FilterToken::Or = token {
            if current_group.is_empty() {
                return Err("OR operator must sit between two terms".to_string());
            }
            or_groups.push(std::mem::take(&mut current_group));
        } else {
            current_group.push(token);
        }
    }
    if current_group.is_empty() {
        return Err("OR operator must sit between two terms".to_string());
    }
    or_groups.push(current_group);

    let mut or_exprs = Vec::new();
    for group in or_groups {
        or_exprs.push(build_and_expression(group)?);
    }

    if or_exprs.len() == 1 {
        Ok(or_exprs.remove(0))
    } else {
        Ok(FilterExpr::Or(or_exprs))
    }
}

/// Build AND expression from a group of terms (implicit AND), applying `not` to the following term
fn build_and_expression(tokens: Vec<FilterToken>) -> Result<FilterExpr, String> {
    let mut and_terms = Vec::new();
    let mut negate = false;

    for token in tokens {
        match token {
            FilterToken::Not => {
                if negate {
                    return Err("NOT operator must be followed by a term".to_string());
                }
                negate = true;
            }
            FilterToken::Term(term) => {
                let expr = FilterExpr::Term(term);
                and_terms.push(if negate { FilterExpr::Not(Box::new(expr)) } else { expr });
                negate = false;
            }
            FilterToken::Or => return Err("Unexpected OR in AND group".to_string()),
        }
    }
    if negate {
        return Err("NOT operator requires a following term".to_string());
    }

    if and_terms.len() == 1 {
        Ok(and_terms.remove(0))
    } else {
        Ok(FilterExpr::And(and_terms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(tokens: &[&str]) -> Result<FilterExpr, String> {
        parse_filter(tokens.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_parse_simple_id() {
        match parse(&["10"]).unwrap() {
            FilterExpr::Term(FilterTerm::Id(10)) => {}
            other => panic!("Expected Id(10), got {:?}", other),
        }
    }

    #[test]
    fn test_parse_priority_list() {
        match parse(&["priority=UI,q2"]).unwrap() {
            FilterExpr::Term(FilterTerm::Priority(qs)) => {
                assert_eq!(qs, vec![Quadrant::UrgentImportant, Quadrant::Important]);
            }
            other => panic!("Expected Priority, got {:?}", other),
        }
        assert!(parse(&["priority=HIGH"]).is_err());
    }

    #[test]
    fn test_parse_implicit_and() {
        match parse(&["priority=UI", "status=open"]).unwrap() {
            FilterExpr::And(terms) => assert_eq!(terms.len(), 2),
            other => panic!("Expected And, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_or_and_not() {
        match parse(&["overdue", "or", "not", "type=work"]).unwrap() {
            FilterExpr::Or(groups) => {
                assert_eq!(groups.len(), 2);
                assert!(matches!(groups[1], FilterExpr::Not(_)));
            }
            other => panic!("Expected Or, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_due_operators() {
        match parse(&["due>=2026-01-10"]).unwrap() {
            FilterExpr::Term(FilterTerm::Due(ComparisonOp::Gte, DueValue::Day(d))) => {
                assert_eq!(d, NaiveDate::from_ymd_opt(2026, 1, 10).unwrap());
            }
            other => panic!("Expected Due, got {:?}", other),
        }
        assert!(matches!(
            parse(&["due=none"]).unwrap(),
            FilterExpr::Term(FilterTerm::Due(ComparisonOp::Eq, DueValue::None))
        ));
        assert!(parse(&["due>any"]).is_err());
        assert!(parse(&["due=someday"]).is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&["project=work"]).unwrap_err().contains("Unknown filter field"));
        assert!(parse(&["priority>UI"]).is_err());
        assert!(parse(&["not"]).is_err());
        assert!(parse(&["or", "overdue"]).is_err());
        assert!(parse(&["overdue", "or"]).is_err());
        assert!(parse(&["bogus"]).is_err());
    }
}
