//! Behavioral tests for the `config.sh` codec: parsing, comment-preserving
//! updates, appends for incomplete documents.

use recdash_core::shell::{parse, update};
use recdash_core::ConfigValues;

const BASE_CONFIG: &str = r#"# Comment
TEAMS_WINDOW_KEYWORDS=(
  "Call" # inline
  "Daily Standup"
)

POLL_INTERVAL_ACTIVE=10
POLL_INTERVAL_INACTIVE=30 # slower when app closed
STABILITY_CHECK_DELAY=5
EXPORT_FOLDER="/Users/tester/Developer/teams_recorder/recordings"
"#;

fn values(keywords: &[&str], active: i64, inactive: i64, delay: i64, folder: &str) -> ConfigValues {
    ConfigValues {
        window_keywords: keywords.iter().map(|k| k.to_string()).collect(),
        poll_interval_active: active,
        poll_interval_inactive: inactive,
        stability_check_delay: delay,
        export_folder: folder.to_string(),
    }
}

// ---------------------------------------------------------------------------
// 1. Parse
// ---------------------------------------------------------------------------

#[test]
fn parses_arrays_and_scalar_values() {
    let parsed = parse(BASE_CONFIG);

    assert_eq!(parsed.window_keywords, vec!["Call", "Daily Standup"]);
    assert_eq!(parsed.poll_interval_active, 10);
    assert_eq!(parsed.poll_interval_inactive, 30);
    assert_eq!(parsed.stability_check_delay, 5);
    assert_eq!(
        parsed.export_folder,
        "/Users/tester/Developer/teams_recorder/recordings"
    );
}

#[test]
fn empty_document_yields_defaults() {
    assert_eq!(parse(""), ConfigValues::default());
    assert_eq!(parse("# only a comment\n\n"), ConfigValues::default());
}

#[test]
fn malformed_values_fall_back_per_field() {
    let text = "POLL_INTERVAL_ACTIVE=fast\nPOLL_INTERVAL_INACTIVE=45\nSTABILITY_CHECK_DELAY=\n";
    let parsed = parse(text);
    assert_eq!(parsed.poll_interval_active, 10);
    assert_eq!(parsed.poll_interval_inactive, 45);
    assert_eq!(parsed.stability_check_delay, 5);
}

#[test]
fn empty_keyword_block_falls_back_to_defaults() {
    let parsed = parse("TEAMS_WINDOW_KEYWORDS=(\n)\n");
    assert_eq!(parsed.window_keywords, vec!["Call", "Meeting"]);
}

#[test]
fn several_tokens_per_line_are_collected_in_order() {
    let parsed = parse("TEAMS_WINDOW_KEYWORDS=(\n  \"a\" \"b\"\n\"c\\\"d\"\n)\n");
    assert_eq!(parsed.window_keywords, vec!["a", "b", "c\"d"]);
}

#[test]
fn hash_inside_quotes_is_not_a_comment() {
    let parsed = parse("EXPORT_FOLDER=\"/tmp/out #1\" # trailing\n");
    assert_eq!(parsed.export_folder, "/tmp/out #1");
}

#[test]
fn unquoted_export_folder_is_used_trimmed() {
    let parsed = parse("EXPORT_FOLDER=  /srv/memos   # note\n");
    assert_eq!(parsed.export_folder, "/srv/memos");
}

#[test]
fn last_assignment_wins() {
    let parsed = parse("POLL_INTERVAL_ACTIVE=3\nPOLL_INTERVAL_ACTIVE=4\n");
    assert_eq!(parsed.poll_interval_active, 4);
}

// ---------------------------------------------------------------------------
// 2. Update
// ---------------------------------------------------------------------------

#[test]
fn updates_known_keys_while_preserving_comments() {
    let updated = update(
        BASE_CONFIG,
        &values(&["Call", "Budget \"Q1\""], 12, 45, 7, "/tmp/out #1"),
    );

    assert!(updated.contains("POLL_INTERVAL_ACTIVE=12\n"));
    assert!(updated.contains("POLL_INTERVAL_INACTIVE=45 # slower when app closed\n"));
    assert!(updated.contains("STABILITY_CHECK_DELAY=7\n"));
    assert!(updated.contains("EXPORT_FOLDER=\"/tmp/out #1\""));
    assert!(updated.contains(r#""Budget \"Q1\"""#));
    assert!(updated.starts_with("# Comment\n"));
    assert!(updated.ends_with('\n'));
}

#[test]
fn numeric_update_leaves_comments_byte_identical() {
    let text = "# header # with hash\nPOLL_INTERVAL_ACTIVE=10   #  spaced   comment\nOTHER=1 # untouched\n";
    let mut next = parse(text);
    next.poll_interval_active = 33;
    let updated = update(text, &next);

    let lines: Vec<&str> = updated.lines().collect();
    assert_eq!(lines[0], "# header # with hash");
    assert_eq!(lines[1], "POLL_INTERVAL_ACTIVE=33 #  spaced   comment");
    assert_eq!(lines[2], "OTHER=1 # untouched");
}

#[test]
fn appends_missing_keys_when_config_is_incomplete() {
    let input = "TEAMS_WINDOW_KEYWORDS=(\n  \"Call\"\n)";
    let updated = update(input, &values(&["Call", "Meeting"], 11, 40, 6, ""));

    assert!(updated.contains("  \"Call\"\n  \"Meeting\"\n)"));
    assert!(updated.contains("POLL_INTERVAL_ACTIVE=11"));
    assert!(updated.contains("POLL_INTERVAL_INACTIVE=40"));
    assert!(updated.contains("STABILITY_CHECK_DELAY=6"));
    assert!(updated.contains("EXPORT_FOLDER=\"\""));
}

#[test]
fn single_line_block_with_scalar_defaults_gains_meeting_keyword() {
    let input = "TEAMS_WINDOW_KEYWORDS=(\"Call\")\nPOLL_INTERVAL_ACTIVE=10\nPOLL_INTERVAL_INACTIVE=30\nSTABILITY_CHECK_DELAY=5\nEXPORT_FOLDER=\"\"\n";
    let updated = update(input, &values(&["Call", "Meeting"], 11, 30, 5, ""));

    assert!(updated.contains("\"Call\""));
    assert!(updated.contains("\"Meeting\""));
    assert!(updated.lines().any(|line| line == "POLL_INTERVAL_ACTIVE=11"));
}

#[test]
fn every_key_appears_exactly_once() {
    let updated = update(BASE_CONFIG, &ConfigValues::default());
    for key in [
        "TEAMS_WINDOW_KEYWORDS=",
        "POLL_INTERVAL_ACTIVE=",
        "POLL_INTERVAL_INACTIVE=",
        "STABILITY_CHECK_DELAY=",
        "EXPORT_FOLDER=",
    ] {
        assert_eq!(updated.matches(key).count(), 1, "{key} in\n{updated}");
    }
}

#[test]
fn block_indentation_is_kept() {
    let input = "if true; then\n    TEAMS_WINDOW_KEYWORDS=(\n        \"x\"\n    )\nfi\n";
    let updated = update(input, &values(&["y", "z"], 10, 30, 5, ""));
    assert!(updated.starts_with(
        "if true; then\n    TEAMS_WINDOW_KEYWORDS=(\n      \"y\"\n      \"z\"\n    )\nfi\n"
    ));
}

#[test]
fn unknown_lines_are_preserved_verbatim() {
    let input = "export PATH=\"/opt/bin:$PATH\"\nCUSTOM_FLAG=yes # keep\n\n\n# end\n";
    let updated = update(input, &ConfigValues::default());
    assert!(updated.starts_with(input.trim_end_matches('\n')));
    assert_eq!(updated.matches("CUSTOM_FLAG=yes # keep").count(), 1);
}
