use chrono::{DateTime, Utc};
use crate::models::Task;

pub const PRODID: &str = "-//Focus Matrix//Tasks//EN";
pub const UID_DOMAIN: &str = "focus-matrix";

/// Longest content line in octets before folding
const MAX_LINE: usize = 75;

/// `YYYYMMDDTHHMMSSZ`
pub fn format_utc(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .unwrap_or_default()
        .format("%Y%m%dT%H%M%SZ")
        .to_string()
}

/// Escape a TEXT value
pub fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            other => out.push(other),
        }
    }
    out
}

/// Fold a content line at 75 octets without splitting a character
fn push_folded(out: &mut String, line: &str) {
    let mut width = 0;
    for c in line.chars() {
        let len = c.len_utf8();
        if width + len > MAX_LINE {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(c);
        width += len;
    }
    out.push_str("\r\n");
}

/// Render tasks with a due date as a VCALENDAR
///
/// Each event lasts one hour from the due time. Undated tasks are skipped.
pub fn write_calendar(tasks: &[Task], now: i64) -> String {
    let mut out = String::new();
    push_folded(&mut out, "BEGIN:VCALENDAR");
    push_folded(&mut out, "VERSION:2.0");
    push_folded(&mut out, &format!("PRODID:{}", PRODID));
    push_folded(&mut out, "CALSCALE:GREGORIAN");

    for task in tasks {
        let Some(due) = task.due_ts else {
            continue;
        };
        let mut description = format!("Priority: {}", task.priority.label());
        if let Some(notes) = &task.notes {
            description.push_str("\n\n");
            description.push_str(notes);
        }

        push_folded(&mut out, "BEGIN:VEVENT");
        push_folded(&mut out, &format!("UID:{}@{}", task.uuid, UID_DOMAIN));
        push_folded(&mut out, &format!("DTSTAMP:{}", format_utc(now)));
        push_folded(&mut out, &format!("DTSTART:{}", format_utc(due)));
        push_folded(&mut out, &format!("DTEND:{}", format_utc(due + 3600)));
        push_folded(&mut out, &format!("SUMMARY:{}", escape_text(&task.title)));
        push_folded(&mut out, &format!("DESCRIPTION:{}", escape_text(&description)));
        if task.completed {
            push_folded(&mut out, "STATUS:COMPLETED");
        }
        push_folded(&mut out, "END:VEVENT");
    }

    push_folded(&mut out, "END:VCALENDAR");
    out
}
