// Error handling utilities for consistent error messages and exit codes

use std::process;

/// Exit with a user error (exit code 1)
/// User errors are for invalid input, missing resources, etc.
pub fn user_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

/// Validate that a string is not empty
pub fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} cannot be empty", field_name))
    } else {
        Ok(())
    }
}

/// Validate that a task or reminder ID is valid (positive integer)
pub fn validate_id(id_str: &str, what: &str) -> Result<i64, String> {
    id_str.parse::<i64>()
        .map_err(|_| format!("Invalid {} ID: '{}'. {} ID must be a number.", what.to_lowercase(), id_str, what))
        .and_then(|id| {
            if id > 0 {
                Ok(id)
            } else {
                Err(format!("Invalid {} ID: {}. {} ID must be positive.", what.to_lowercase(), id, what))
            }
        })
}

pub fn validate_task_id(id_str: &str) -> Result<i64, String> {
    validate_id(id_str, "Task")
}

/// Parse a comma-separated list of IDs and ranges (`1,3,5-7`)
pub fn parse_task_id_list(spec: &str) -> Result<Vec<i64>, String> {
    let mut ids = Vec::new();
    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if let Some((start, end)) = part.split_once('-') {
            let start = validate_task_id(start)?;
            let end = validate_task_id(end)?;
            if start > end {
                return Err(format!("Invalid task ID range: '{}'. Start must not exceed end.", part));
            }
            ids.extend(start..=end);
        } else {
            ids.push(validate_task_id(part)?);
        }
    }
    if ids.is_empty() {
        return Err(format!("Invalid task ID: '{}'.", spec));
    }
    ids.dedup();
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_non_empty() {
        assert!(validate_non_empty("test", "field").is_ok());
        assert!(validate_non_empty("", "field").is_err());
        assert!(validate_non_empty("   ", "field").is_err());
    }

    #[test]
    fn test_validate_task_id() {
        assert_eq!(validate_task_id("1"), Ok(1));
        assert_eq!(validate_task_id("42"), Ok(42));
        assert!(validate_task_id("0").is_err());
        assert!(validate_task_id("-1").is_err());
        assert!(validate_task_id("abc").is_err());
        assert!(validate_task_id("").is_err());
        assert!(validate_id("x", "Reminder").unwrap_err().contains("reminder ID"));
    }

    #[test]
    fn test_parse_task_id_list() {
        assert_eq!(parse_task_id_list("3"), Ok(vec![3]));
        assert_eq!(parse_task_id_list("1,3,5-7"), Ok(vec![1, 3, 5, 6, 7]));
        assert!(parse_task_id_list("7-5").is_err());
        assert!(parse_task_id_list("a,b").is_err());
        assert!(parse_task_id_list(",").is_err());
    }
}
