// Duration parsing for offsets like `+3d` and reminder leads like `30m`

use anyhow::{anyhow, bail, Result};

/// Parse a duration expression and return seconds
///
/// Accepts one or more `<number><unit>` groups with units `w`, `d`, `h`, `m`, `s`,
/// e.g. `30s`, `10m`, `2h`, `1h30m`, `1w2d`.
pub fn parse_duration(expr: &str) -> Result<i64> {
    let expr = expr.trim();
    if expr.is_empty() {
        bail!("Empty duration");
    }

    let mut total_secs = 0i64;
    let mut digits = String::new();
    for c in expr.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if digits.is_empty() {
            bail!("Invalid duration format: {}", expr);
        }
        let value: i64 = digits
            .parse()
            .map_err(|_| anyhow!("Invalid duration format: {}", expr))?;
        let unit = match c.to_ascii_lowercase() {
            'w' => 7 * 86400,
            'd' => 86400,
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => bail!("Invalid duration unit '{}' in {}", c, expr),
        };
        total_secs += value * unit;
        digits.clear();
    }
    if !digits.is_empty() {
        bail!("Duration '{}' is missing a unit (w, d, h, m, s)", expr);
    }

    if total_secs == 0 {
        bail!("Duration must be greater than 0");
    }

    Ok(total_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), 30);
        assert_eq!(parse_duration("10m").unwrap(), 600);
        assert_eq!(parse_duration("2h").unwrap(), 7200);
        assert_eq!(parse_duration("1h30m").unwrap(), 5400);
        assert_eq!(parse_duration("1w2d").unwrap(), 9 * 86400);
    }

    #[test]
    fn test_parse_duration_errors() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("15").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("3y").is_err());
        assert!(parse_duration("0m").is_err());
    }
}
