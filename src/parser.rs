//! Parsers for the string-encoded cells found in agency extracts.
//!
//! List columns arrive as bracketed literals (`['06:18:08','07:00:00']`) and
//! times as `HH:MM:SS` or `HH:MM`.

use chrono::NaiveTime;

/// Parses a list cell into its items.
///
/// Accepts a bracketed literal of quoted strings. Anything that does not fit
/// that grammar is split on commas after stripping brackets and quotes.
/// Empty input yields an empty list.
pub fn parse_list_literal(raw: &str) -> Vec<String> {
    let s = raw.trim();
    if s.is_empty() {
        return Vec::new();
    }
    parse_quoted_list(s).unwrap_or_else(|| fallback_split(s))
}

fn parse_quoted_list(s: &str) -> Option<Vec<String>> {
    let inner = s.strip_prefix('[')?.strip_suffix(']')?;
    let mut items = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(quote) = chars.next() else {
            break;
        };
        if quote != '\'' && quote != '"' {
            return None;
        }

        let mut item = String::new();
        let mut closed = false;
        while let Some(c) = chars.next() {
            match c {
                '\\' => item.push(chars.next()?),
                c if c == quote => {
                    closed = true;
                    break;
                }
                c => item.push(c),
            }
        }
        if !closed {
            return None;
        }
        items.push(item);

        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        match chars.next() {
            Some(',') => continue,
            None => break,
            Some(_) => return None,
        }
    }

    Some(items)
}

fn fallback_split(s: &str) -> Vec<String> {
    let s = s.trim_matches(|c| c == '[' || c == ']');
    s.split(',')
        .map(|item| item.trim().trim_matches(|c| c == '\'' || c == '"'))
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Renders items back into the bracketed literal form read by [`parse_list_literal`].
pub fn render_list_literal(items: &[String]) -> String {
    let quoted: Vec<String> = items
        .iter()
        .map(|item| format!("'{}'", item.replace('\\', "\\\\").replace('\'', "\\'")))
        .collect();
    format!("[{}]", quoted.join(", "))
}

/// Parses `HH:MM:SS`, then `HH:MM`. Returns `None` for anything else.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}
