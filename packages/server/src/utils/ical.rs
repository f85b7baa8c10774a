use chrono::{DateTime, Utc};

/// A single VEVENT.
pub struct CalendarItem<'a> {
    /// Globally unique, e.g. `programme-12@instanssi`.
    pub uid: String,
    pub summary: &'a str,
    pub description: &'a str,
    pub location: &'a str,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

fn format_time(t: DateTime<Utc>) -> String {
    t.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Escape TEXT values (RFC 5545 section 3.3.11).
fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}

/// Fold content lines longer than 75 octets without splitting a UTF-8
/// sequence.
fn fold_line(line: &str, out: &mut String) {
    let mut width = 0;
    for c in line.chars() {
        let len = c.len_utf8();
        if width + len > 75 {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(c);
        width += len;
    }
    out.push_str("\r\n");
}

/// Render a calendar named `name`.
pub fn render_calendar(name: &str, items: &[CalendarItem<'_>], now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let mut line = |s: String| fold_line(&s, &mut out);

    line("BEGIN:VCALENDAR".into());
    line("VERSION:2.0".into());
    line("PRODID:-//Instanssi//Programme//FI".into());
    line("CALSCALE:GREGORIAN".into());
    line(format!("X-WR-CALNAME:{}", escape_text(name)));
    for item in items {
        line("BEGIN:VEVENT".into());
        line(format!("UID:{}", item.uid));
        line(format!("DTSTAMP:{}", format_time(now)));
        line(format!("DTSTART:{}", format_time(item.start)));
        if let Some(end) = item.end {
            line(format!("DTEND:{}", format_time(end)));
        }
        line(format!("SUMMARY:{}", escape_text(item.summary)));
        if !item.description.is_empty() {
            line(format!("DESCRIPTION:{}", escape_text(item.description)));
        }
        if !item.location.is_empty() {
            line(format!("LOCATION:{}", escape_text(item.location)));
        }
        line("END:VEVENT".into());
    }
    line("END:VCALENDAR".into());

    out
}
