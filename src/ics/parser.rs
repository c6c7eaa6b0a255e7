use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use crate::ics::{IcsError, IcsEvent};
use crate::utils::date::local_ts;

/// One content line: `NAME;PARAM=VALUE:value`
struct Property<'a> {
    name: String,
    params: Vec<(String, String)>,
    value: &'a str,
}

impl Property<'_> {
    fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Join RFC 5545 folded lines (continuations start with a space or tab)
fn unfold(text: &str) -> Vec<(usize, String)> {
    let mut lines: Vec<(usize, String)> = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let raw = raw.trim_end_matches('\r');
        if let Some(rest) = raw.strip_prefix(' ').or_else(|| raw.strip_prefix('\t')) {
            if let Some((_, last)) = lines.last_mut() {
                last.push_str(rest);
                continue;
            }
        }
        if !raw.trim().is_empty() {
            lines.push((idx + 1, raw.to_string()));
        }
    }
    lines
}

fn parse_property(line: &str) -> Option<Property<'_>> {
    let colon = line.find(':')?;
    let (head, value) = (&line[..colon], &line[colon + 1..]);
    let mut parts = head.split(';');
    let name = parts.next()?.trim().to_uppercase();
    let params = parts
        .filter_map(|p| p.split_once('='))
        .map(|(k, v)| (k.trim().to_uppercase(), v.trim().trim_matches('"').to_string()))
        .collect();
    Some(Property { name, params, value })
}

/// Undo TEXT escaping (`\n`, `\,`, `\;`, `\\`)
pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Parse a DATE or DATE-TIME value into a timestamp
///
/// Returns `(timestamp, is_date_only)`. Floating and `TZID` times are read as
/// local time; a trailing `Z` means UTC.
pub fn parse_ics_datetime(value: &str, date_only_hint: bool) -> Result<(i64, bool), IcsError> {
    let value = value.trim();
    let invalid = || IcsError::InvalidDateTime(value.to_string());

    if date_only_hint || (value.len() == 8 && value.chars().all(|c| c.is_ascii_digit())) {
        let digits = value.get(..value.len().min(8)).ok_or_else(invalid)?;
        let date = NaiveDate::parse_from_str(digits, "%Y%m%d").map_err(|_| invalid())?;
        let ts = local_ts(&date.and_time(NaiveTime::MIN)).map_err(|_| invalid())?;
        return Ok((ts, true));
    }

    if let Some(utc) = value.strip_suffix('Z').or_else(|| value.strip_suffix('z')) {
        let naive = NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S").map_err(|_| invalid())?;
        return Ok((Utc.from_utc_datetime(&naive).timestamp(), false));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").map_err(|_| invalid())?;
    let ts = local_ts(&naive).map_err(|_| invalid())?;
    Ok((ts, false))
}

#[derive(Default)]
struct EventBuilder {
    uid: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    start: Option<(i64, bool)>,
    end: Option<i64>,
}

impl EventBuilder {
    fn build(self, line: usize) -> Option<IcsEvent> {
        match (self.uid, self.summary, self.start) {
            (Some(uid), Some(summary), Some((start, all_day))) if !summary.trim().is_empty() => Some(IcsEvent {
                uid,
                summary: summary.trim().to_string(),
                description: self.description.filter(|d| !d.trim().is_empty()),
                start,
                end: self.end,
                all_day,
            }),
            _ => {
                log::warn!("Skipping VEVENT ending at line {}: missing UID, SUMMARY or DTSTART", line);
                None
            }
        }
    }
}

/// Parse calendar text into events
///
/// Events missing a UID, SUMMARY or DTSTART, or with an unreadable DTSTART, are skipped.
pub fn parse_calendar(text: &str) -> Result<Vec<IcsEvent>, IcsError> {
    let lines = unfold(text);
    let looks_like_calendar = lines.iter().any(|(_, l)| {
        let upper = l.trim().to_uppercase();
        upper == "BEGIN:VCALENDAR" || upper == "BEGIN:VEVENT"
    });
    if !looks_like_calendar {
        return Err(IcsError::NotCalendar);
    }

    let mut events = Vec::new();
    let mut current: Option<(usize, EventBuilder)> = None;
    // Nested components (VALARM) inside an event are ignored
    let mut nested_depth = 0usize;

    for (lineno, line) in &lines {
        let Some(prop) = parse_property(line) else {
            continue;
        };
        let value_upper = prop.value.trim().to_uppercase();

        match (prop.name.as_str(), value_upper.as_str()) {
            ("BEGIN", "VEVENT") => {
                if let Some((start_line, _)) = current {
                    return Err(IcsError::UnterminatedEvent(start_line));
                }
                current = Some((*lineno, EventBuilder::default()));
                nested_depth = 0;
                continue;
            }
            ("END", "VEVENT") => {
                if let Some((_, builder)) = current.take() {
                    if let Some(event) = builder.build(*lineno) {
                        events.push(event);
                    }
                }
                continue;
            }
            ("BEGIN", _) if current.is_some() => {
                nested_depth += 1;
                continue;
            }
            ("END", _) if current.is_some() => {
                nested_depth = nested_depth.saturating_sub(1);
                continue;
            }
            _ => {}
        }

        let Some((_, builder)) = current.as_mut() else {
            continue;
        };
        if nested_depth > 0 {
            continue;
        }

        let date_only = prop.param("VALUE").map_or(false, |v| v.eq_ignore_ascii_case("DATE"));
        match prop.name.as_str() {
            "UID" => builder.uid = Some(prop.value.trim().to_string()),
            "SUMMARY" => builder.summary = Some(unescape_text(prop.value)),
            "DESCRIPTION" => builder.description = Some(unescape_text(prop.value)),
            "DTSTART" => match parse_ics_datetime(prop.value, date_only) {
                Ok(parsed) => builder.start = Some(parsed),
                Err(e) => log::warn!("Line {}: {}", lineno, e),
            },
            "DTEND" => match parse_ics_datetime(prop.value, date_only) {
                Ok((ts, _)) => builder.end = Some(ts),
                Err(e) => log::warn!("Line {}: {}", lineno, e),
            },
            _ => {}
        }
    }

    if let Some((start_line, _)) = current {
        return Err(IcsError::UnterminatedEvent(start_line));
    }

    Ok(events)
}

/// Keep events starting within `[now, now + days]`
///
/// A window too large to represent keeps every event from `now` on.
pub fn within_window(events: Vec<IcsEvent>, now: i64, days: i64) -> Vec<IcsEvent> {
    let end = Duration::try_days(days)
        .and_then(|span| now.checked_add(span.num_seconds()))
        .unwrap_or(i64::MAX);
    events
        .into_iter()
        .filter(|e| e.start >= now && e.start <= end)
        .collect()
}
