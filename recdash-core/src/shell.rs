//! Lossless reader/writer for the watcher's shell-style `config.sh`.
//!
//! The document is treated as an ordered list of opaque lines. Only three
//! shapes are recognized:
//!
//! ```text
//! TEAMS_WINDOW_KEYWORDS=(      <- array block start
//!   "Call" "Daily Standup"     <- body: every double-quoted token counts
//! )                            <- block end
//! POLL_INTERVAL_ACTIVE=10 # c  <- scalar assignment with optional comment
//! ```
//!
//! Anything else (comments, blank lines, unknown keys) is carried through
//! [`update`] byte-for-byte.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::{
    ConfigValues, EXPORT_FOLDER_KEY, KEYWORDS_KEY, POLL_ACTIVE_KEY, POLL_INACTIVE_KEY,
    STABILITY_KEY,
};

const SCALAR_KEYS: [&str; 4] = [
    POLL_ACTIVE_KEY,
    POLL_INACTIVE_KEY,
    STABILITY_KEY,
    EXPORT_FOLDER_KEY,
];

fn assignment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\s*)([A-Z_][A-Z0-9_]*)\s*=(.*)$").expect("valid regex"))
}

fn array_start_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"^(\s*){KEYWORDS_KEY}\s*=\s*\(")).expect("valid regex")
    })
}

fn array_end_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*\)").expect("valid regex"))
}

fn quoted_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""((?:\\.|[^"\\])*)""#).expect("valid regex"))
}

fn escaped_char_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\\([\\`"$])"#).expect("valid regex"))
}

// ---------------------------------------------------------------------------
// Quoting
// ---------------------------------------------------------------------------

/// Wrap `value` in double quotes, backslash-escaping `\`, `` ` ``, `"` and `$`.
pub fn encode_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        if matches!(ch, '\\' | '`' | '"' | '$') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

/// Inverse of [`encode_quoted`]. Values that are not wrapped in double quotes
/// come back trimmed and otherwise untouched.
pub fn decode_quoted(value: &str) -> String {
    if value.len() < 2 || !value.starts_with('"') || !value.ends_with('"') {
        return value.trim().to_string();
    }
    unescape(&value[1..value.len() - 1])
}

fn unescape(inner: &str) -> String {
    escaped_char_re().replace_all(inner, "$1").into_owned()
}

/// Split the right-hand side of an assignment into `(value, comment)`.
///
/// `#` opens a comment only outside single and double quotes and when not
/// preceded by a backslash. Both halves are trimmed; `comment` keeps its
/// leading `#` and is empty when there is none.
pub fn split_value_and_comment(input: &str) -> (&str, &str) {
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;

    for (idx, ch) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '#' if !in_single && !in_double => {
                return (input[..idx].trim(), input[idx..].trim());
            }
            _ => {}
        }
    }

    (input.trim(), "")
}

/// Parse an integer the way the watcher's shell tooling is lenient about it:
/// optional leading whitespace and sign, then the longest run of digits.
/// Trailing garbage is ignored; no digits at all yields `None`.
pub fn parse_leading_int(input: &str) -> Option<i64> {
    let trimmed = input.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let run: &str = {
        let end = digits
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(digits.len());
        &digits[..end]
    };
    if run.is_empty() {
        return None;
    }

    let magnitude = run.bytes().fold(0i64, |acc, b| {
        acc.saturating_mul(10).saturating_add(i64::from(b - b'0'))
    });
    Some(if negative { -magnitude } else { magnitude })
}

// ---------------------------------------------------------------------------
// Parse
// ---------------------------------------------------------------------------

/// Read the five known settings out of `text`, falling back per key to the
/// defaults when a key is absent or its value is malformed.
pub fn parse(text: &str) -> ConfigValues {
    let lines = split_lines(text);
    let mut values = ConfigValues::default();

    let keywords = parse_keywords(&lines);
    if !keywords.is_empty() {
        values.window_keywords = keywords;
    }

    for line in &lines {
        let Some(caps) = assignment_re().captures(line) else {
            continue;
        };
        let key = &caps[2];
        let (value, _comment) = split_value_and_comment(&caps[3]);

        match key {
            POLL_ACTIVE_KEY | POLL_INACTIVE_KEY | STABILITY_KEY => {
                let Some(number) = parse_leading_int(value) else {
                    continue;
                };
                match key {
                    POLL_ACTIVE_KEY => values.poll_interval_active = number,
                    POLL_INACTIVE_KEY => values.poll_interval_inactive = number,
                    _ => values.stability_check_delay = number,
                }
            }
            EXPORT_FOLDER_KEY => values.export_folder = decode_quoted(value),
            _ => {}
        }
    }

    values
}

fn parse_keywords(lines: &[&str]) -> Vec<String> {
    let Some(start) = lines.iter().position(|line| array_start_re().is_match(line)) else {
        return Vec::new();
    };

    let mut keywords = Vec::new();
    for line in &lines[start + 1..] {
        if array_end_re().is_match(line) {
            break;
        }
        for caps in quoted_token_re().captures_iter(line) {
            keywords.push(unescape(&caps[1]));
        }
    }
    keywords
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

/// Rewrite `text` so that it carries `values`, touching only the lines that
/// hold one of the five keys. Keys with no line in `text` are appended.
pub fn update(text: &str, values: &ConfigValues) -> String {
    let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
    let mut handled: Vec<&str> = Vec::new();

    if let Some(start) = lines
        .iter()
        .position(|line| array_start_re().is_match(strip_cr(line)))
    {
        let end = lines[start + 1..]
            .iter()
            .position(|line| array_end_re().is_match(strip_cr(line)))
            .map(|offset| start + 1 + offset)
            .unwrap_or(start);

        let indent = array_start_re()
            .captures(strip_cr(&lines[start]))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let eol = line_ending(&lines[start]);

        let block: Vec<String> = render_keyword_block(&values.window_keywords, &indent)
            .into_iter()
            .map(|line| format!("{line}{eol}"))
            .collect();
        lines.splice(start..=end, block);
        handled.push(KEYWORDS_KEY);
    }

    for line in lines.iter_mut() {
        let body = strip_cr(line);
        let Some(caps) = assignment_re().captures(body) else {
            continue;
        };
        let key = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        let Some(key) = SCALAR_KEYS.iter().copied().find(|k| *k == key) else {
            continue;
        };

        let indent = &caps[1];
        let (_value, comment) = split_value_and_comment(&caps[3]);
        let suffix = if comment.is_empty() {
            String::new()
        } else {
            format!(" {comment}")
        };
        let rendered = format!(
            "{indent}{key}={}{suffix}{}",
            render_scalar(key, values),
            line_ending(line)
        );
        *line = rendered;
        if !handled.contains(&key) {
            handled.push(key);
        }
    }

    let mut appended = Vec::new();
    if !handled.contains(&KEYWORDS_KEY) {
        appended.extend(render_keyword_block(&values.window_keywords, ""));
    }
    for key in SCALAR_KEYS {
        if !handled.contains(&key) {
            appended.push(format!("{key}={}", render_scalar(key, values)));
        }
    }

    if !appended.is_empty() {
        // Keep a trailing newline trailing.
        let at = match lines.last() {
            Some(last) if last.is_empty() => lines.len() - 1,
            _ => lines.len(),
        };
        lines.splice(at..at, appended);
    }

    lines.join("\n")
}

fn render_keyword_block(keywords: &[String], indent: &str) -> Vec<String> {
    let mut block = Vec::with_capacity(keywords.len() + 2);
    block.push(format!("{indent}{KEYWORDS_KEY}=("));
    block.extend(
        keywords
            .iter()
            .map(|keyword| format!("{indent}  {}", encode_quoted(keyword))),
    );
    block.push(format!("{indent})"));
    block
}

fn render_scalar(key: &str, values: &ConfigValues) -> String {
    match key {
        POLL_ACTIVE_KEY => values.poll_interval_active.to_string(),
        POLL_INACTIVE_KEY => values.poll_interval_inactive.to_string(),
        STABILITY_KEY => values.stability_check_delay.to_string(),
        _ => encode_quoted(&values.export_folder),
    }
}

fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n').map(strip_cr).collect()
}

fn strip_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

fn line_ending(line: &str) -> &'static str {
    if line.ends_with('\r') {
        "\r"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_ignores_hash_inside_quotes() {
        assert_eq!(
            split_value_and_comment(r#""/tmp/out #1" # where"#),
            (r#""/tmp/out #1""#, "# where")
        );
        assert_eq!(split_value_and_comment("'a # b'"), ("'a # b'", ""));
        assert_eq!(split_value_and_comment(r"a\#b # c"), (r"a\#b", "# c"));
    }

    #[test]
    fn leading_int_matches_lenient_shell_parsing() {
        assert_eq!(parse_leading_int(" 12"), Some(12));
        assert_eq!(parse_leading_int("12abc"), Some(12));
        assert_eq!(parse_leading_int("-3"), Some(-3));
        assert_eq!(parse_leading_int("\"12\""), None);
        assert_eq!(parse_leading_int(""), None);
        assert_eq!(parse_leading_int("+"), None);
    }

    #[test]
    fn decode_leaves_unquoted_values_alone() {
        assert_eq!(decode_quoted("/plain/path"), "/plain/path");
        assert_eq!(decode_quoted("\""), "\"");
        assert_eq!(decode_quoted(r#""a\$b""#), "a$b");
        assert_eq!(decode_quoted(r#""keep \n""#), r"keep \n");
    }

    #[test]
    fn crlf_lines_keep_their_line_endings() {
        let text = "# head\r\nPOLL_INTERVAL_ACTIVE=10 # fast\r\n";
        let values = ConfigValues {
            poll_interval_active: 20,
            ..ConfigValues::default()
        };
        let updated = update(text, &values);
        assert!(updated.starts_with("# head\r\nPOLL_INTERVAL_ACTIVE=20 # fast\r\n"));
        assert_eq!(parse(&updated), values);
    }
}
