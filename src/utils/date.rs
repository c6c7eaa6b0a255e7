// Date expression parsing and local calendar helpers

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Weekday};
use anyhow::{anyhow, Result};
use crate::utils::duration::parse_duration;

/// Longest day span accepted for windows and lookbacks (about a century)
pub const MAX_SPAN_DAYS: i64 = 36_500;

/// Parse a date expression relative to the current time and return a Unix timestamp
pub fn parse_date_expr(expr: &str) -> Result<i64> {
    parse_date_expr_at(expr, Local::now())
}

/// Parse a date expression relative to `now`
///
/// Supported forms:
/// - `2026-01-10` (end of that day), `2026-01-10T14:30`, `2026-01-10 14:30`
/// - `now`, `today`, `tomorrow`, `yesterday`, `eod`
/// - `14:30` (today at that time)
/// - `+3d`, `-2h`, `+1w` offsets from now
/// - weekday names (`mon`, `friday`): next such day, end of day
///
/// Date-only forms resolve to 23:59:59 so a task due today is not overdue until the day ends.
pub fn parse_date_expr_at(expr: &str, now: DateTime<Local>) -> Result<i64> {
    let expr = expr.trim();
    let lower = expr.to_lowercase();

    if let Ok(date) = NaiveDate::parse_from_str(expr, "%Y-%m-%d") {
        return end_of_day(date);
    }
    for fmt in ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(expr, fmt) {
            return local_ts(&datetime);
        }
    }

    let today = now.date_naive();
    match lower.as_str() {
        "now" => return Ok(now.timestamp()),
        "today" | "eod" => return end_of_day(today),
        "tomorrow" => return end_of_day(today + Duration::days(1)),
        "yesterday" => return end_of_day(today - Duration::days(1)),
        _ => {}
    }

    if let Ok(time) = NaiveTime::parse_from_str(expr, "%H:%M") {
        return local_ts(&today.and_time(time));
    }

    if let Some(rest) = lower.strip_prefix('+') {
        return Ok(now.timestamp() + parse_duration(rest)?);
    }
    if let Some(rest) = lower.strip_prefix('-') {
        return Ok(now.timestamp() - parse_duration(rest)?);
    }

    if let Some(weekday) = parse_weekday(&lower) {
        let mut day = today + Duration::days(1);
        while day.weekday() != weekday {
            day += Duration::days(1);
        }
        return end_of_day(day);
    }

    Err(anyhow!(
        "Unrecognized date expression: '{}'. Use YYYY-MM-DD, YYYY-MM-DDTHH:MM, HH:MM, today, tomorrow, +3d or a weekday name",
        expr
    ))
}

/// Local calendar day named by a date expression
pub fn parse_day_expr_at(expr: &str, now: DateTime<Local>) -> Result<NaiveDate> {
    let ts = parse_date_expr_at(expr, now)?;
    Ok(local_day(ts))
}

fn parse_weekday(s: &str) -> Option<Weekday> {
    match s {
        "mon" | "monday" => Some(Weekday::Mon),
        "tue" | "tues" | "tuesday" => Some(Weekday::Tue),
        "wed" | "wednesday" => Some(Weekday::Wed),
        "thu" | "thurs" | "thursday" => Some(Weekday::Thu),
        "fri" | "friday" => Some(Weekday::Fri),
        "sat" | "saturday" => Some(Weekday::Sat),
        "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Convert a local wall-clock time to a timestamp, taking the earlier instant on DST overlaps
pub fn local_ts(datetime: &NaiveDateTime) -> Result<i64> {
    Local
        .from_local_datetime(datetime)
        .earliest()
        .or_else(|| Local.from_local_datetime(&(*datetime + Duration::hours(1))).earliest())
        .map(|dt| dt.timestamp())
        .ok_or_else(|| anyhow!("Invalid local time: {}", datetime))
}

/// Local calendar day containing a timestamp
pub fn local_day(ts: i64) -> NaiveDate {
    to_local(ts).date_naive()
}

pub fn to_local(ts: i64) -> DateTime<Local> {
    Local
        .timestamp_opt(ts, 0)
        .single()
        .unwrap_or_else(|| Local::now())
}

pub fn start_of_day(day: NaiveDate) -> Result<i64> {
    local_ts(&day.and_time(NaiveTime::MIN))
}

pub fn end_of_day(day: NaiveDate) -> Result<i64> {
    let time = NaiveTime::from_hms_opt(23, 59, 59).ok_or_else(|| anyhow!("Invalid time"))?;
    local_ts(&day.and_time(time))
}

/// Half-open `[start, end)` timestamp range covering a local day
pub fn day_bounds(day: NaiveDate) -> Result<(i64, i64)> {
    Ok((start_of_day(day)?, start_of_day(day + Duration::days(1))?))
}

/// Move a timestamp to another local day, keeping its time of day
pub fn with_day(ts: i64, day: NaiveDate) -> Result<i64> {
    local_ts(&day.and_time(to_local(ts).time()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_now() -> DateTime<Local> {
        // Wednesday 2026-03-11 10:00 local
        Local
            .from_local_datetime(&NaiveDate::from_ymd_opt(2026, 3, 11).unwrap().and_hms_opt(10, 0, 0).unwrap())
            .single()
            .unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_absolute_dates() {
        let now = fixed_now();
        let ts = parse_date_expr_at("2026-01-10", now).unwrap();
        assert_eq!(local_day(ts), day(2026, 1, 10));
        assert_eq!(to_local(ts).time(), NaiveTime::from_hms_opt(23, 59, 59).unwrap());

        let ts = parse_date_expr_at("2026-01-10T14:30", now).unwrap();
        assert_eq!(to_local(ts).time(), NaiveTime::from_hms_opt(14, 30, 0).unwrap());
        let ts2 = parse_date_expr_at("2026-01-10 14:30", now).unwrap();
        assert_eq!(ts, ts2);
    }

    #[test]
    fn test_relative_words() {
        let now = fixed_now();
        assert_eq!(parse_date_expr_at("now", now).unwrap(), now.timestamp());
        assert_eq!(local_day(parse_date_expr_at("today", now).unwrap()), day(2026, 3, 11));
        assert_eq!(local_day(parse_date_expr_at("Tomorrow", now).unwrap()), day(2026, 3, 12));
        assert_eq!(local_day(parse_date_expr_at("yesterday", now).unwrap()), day(2026, 3, 10));
    }

    #[test]
    fn test_offsets_and_times() {
        let now = fixed_now();
        assert_eq!(parse_date_expr_at("+3d", now).unwrap(), now.timestamp() + 3 * 86400);
        assert_eq!(parse_date_expr_at("-2h", now).unwrap(), now.timestamp() - 7200);
        let ts = parse_date_expr_at("16:45", now).unwrap();
        assert_eq!(local_day(ts), day(2026, 3, 11));
        assert_eq!(to_local(ts).time(), NaiveTime::from_hms_opt(16, 45, 0).unwrap());
    }

    #[test]
    fn test_weekday_is_strictly_after_today() {
        let now = fixed_now();
        assert_eq!(local_day(parse_date_expr_at("fri", now).unwrap()), day(2026, 3, 13));
        assert_eq!(local_day(parse_date_expr_at("wednesday", now).unwrap()), day(2026, 3, 18));
    }

    #[test]
    fn test_invalid_expression() {
        assert!(parse_date_expr_at("someday", fixed_now()).is_err());
    }

    #[test]
    fn test_with_day_keeps_time() {
        let ts = parse_date_expr_at("2026-01-10T08:15", fixed_now()).unwrap();
        let moved = with_day(ts, day(2026, 1, 12)).unwrap();
        assert_eq!(local_day(moved), day(2026, 1, 12));
        assert_eq!(to_local(moved).time(), NaiveTime::from_hms_opt(8, 15, 0).unwrap());
    }

    #[test]
    fn test_day_bounds() {
        let (start, end) = day_bounds(day(2026, 1, 10)).unwrap();
        assert!(start < end);
        assert_eq!(local_day(start), day(2026, 1, 10));
        assert_eq!(local_day(end), day(2026, 1, 11));
    }
}
