// CLI parsing utilities for task commands

use crate::utils::fuzzy::levenshtein_distance;

/// Parsed task arguments from command line
#[derive(Debug, Default)]
pub struct ParsedTaskArgs {
    pub title: Vec<String>,
    pub priority: Option<String>,
    pub due: Option<String>,
    pub notes: Option<String>,
    pub task_type: Option<String>,
    pub remind: Option<String>,
    pub email: Option<String>,
}

/// Field name error
#[derive(Debug)]
pub enum FieldParseError {
    InvalidFieldName {
        field: String,
        suggestion: String,
    },
    ReadOnlyField {
        field: String,
        hint: String,
    },
    UnknownFieldToken {
        token: String,
    },
}

impl std::fmt::Display for FieldParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldParseError::InvalidFieldName { field, suggestion } => {
                write!(f, "Unrecognized field name '{}'\n  Did you mean '{}'?", field, suggestion)
            }
            FieldParseError::ReadOnlyField { field, hint } => {
                write!(f, "Field '{}' cannot be modified directly.\n  {}", field, hint)
            }
            FieldParseError::UnknownFieldToken { token } => {
                write!(f, "Unrecognized field token '{}'\n  If this is meant to be part of the title, remove the equals sign or quote the entire title.", token)
            }
        }
    }
}

/// Valid field names (exact match only, no abbreviations)
pub const FIELD_NAMES: &[&str] = &[
    "priority",
    "due",
    "notes",
    "type",
    "remind",
    "email",
];

/// Fields that exist on a task but are not set through field tokens
const READ_ONLY_FIELDS: &[&str] = &[
    "status",
    "completed",
    "rollover",
    "origin",
    "created",
    "modified",
    "id",
];

/// Find the most similar field name using fuzzy matching
fn find_similar_field_name(field: &str) -> Option<String> {
    if !field.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let mut best_match: Option<(&str, usize)> = None;

    for name in FIELD_NAMES {
        let distance = levenshtein_distance(&field.to_lowercase(), name);
        if distance <= 2 {
            match best_match {
                None => best_match = Some((name, distance)),
                Some((_, best_dist)) if distance < best_dist => {
                    best_match = Some((name, distance));
                }
                _ => {}
            }
        }
    }

    best_match.map(|(name, _)| name.to_string())
}

fn get_read_only_hint(field: &str) -> String {
    match field.to_lowercase().as_str() {
        "status" | "completed" => "Use 'focus done' or 'focus undone' to change completion.".to_string(),
        "rollover" => "Rollover count increases when an overdue task is rolled forward.".to_string(),
        "origin" => "Origin is set when a task is created or imported.".to_string(),
        "created" => "Created timestamp is set automatically and cannot be changed.".to_string(),
        "modified" => "Modified timestamp is updated automatically.".to_string(),
        "id" => "Task ID is assigned automatically and cannot be changed.".to_string(),
        _ => "This field is read-only.".to_string(),
    }
}

/// Parse a field token (field=value)
/// Handles empty values (field=) by converting to field=none
fn parse_field_token(token: &str) -> Result<Option<(String, String)>, FieldParseError> {
    let Some((field, value)) = token.split_once('=') else {
        return Ok(None);
    };
    let final_value = if value.is_empty() { "none".to_string() } else { value.to_string() };

    if READ_ONLY_FIELDS.iter().any(|f| f.eq_ignore_ascii_case(field)) {
        return Err(FieldParseError::ReadOnlyField {
            field: field.to_string(),
            hint: get_read_only_hint(field),
        });
    }

    if FIELD_NAMES.contains(&field) {
        return Ok(Some((field.to_string(), final_value)));
    }

    if let Some(suggestion) = find_similar_field_name(field) {
        return Err(FieldParseError::InvalidFieldName {
            field: field.to_string(),
            suggestion,
        });
    }

    // Looks like a field name but isn't one
    if field.len() >= 2 && field.chars().all(|c| c.is_ascii_alphabetic() || c == '_' || c == '.') {
        return Err(FieldParseError::UnknownFieldToken { token: token.to_string() });
    }

    Ok(None)
}

/// Parse task add/modify arguments
/// The title is every token that is not a field token or a flag;
/// field tokens may appear anywhere in the argument list
pub fn parse_task_args(args: Vec<String>) -> Result<ParsedTaskArgs, FieldParseError> {
    let mut parsed = ParsedTaskArgs::default();

    for arg in args {
        if arg.starts_with("--") {
            continue;
        }
        match parse_field_token(&arg)? {
            Some((field, value)) => match field.as_str() {
                "priority" => parsed.priority = Some(value),
                "due" => parsed.due = Some(value),
                "notes" => parsed.notes = Some(value),
                "type" => parsed.task_type = Some(value),
                "remind" => parsed.remind = Some(value),
                "email" => parsed.email = Some(value),
                _ => parsed.title.push(arg),
            },
            None => parsed.title.push(arg),
        }
    }

    Ok(parsed)
}

/// Join title parts into a single string
pub fn join_title(parts: &[String]) -> String {
    parts.join(" ")
}
