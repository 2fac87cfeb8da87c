//! Integration tests for the draft lifecycle through the `pd` CLI.
//!
//! Covers:
//! - Display fallback (draft > server copy > defaults)
//! - Writes persisting across invocations
//! - Automatic eviction once a draft matches the server
//! - Explicit reset and save
//! - Failure reporting

mod common;

use common::{TestEnv, sample_server};
use predicates::prelude::*;
use std::fs;

// === Show ===

#[test]
fn test_show_without_draft_or_server_is_default_form() {
    let env = TestEnv::new();

    let shown = env.json(&["show", "42"]);
    assert_eq!(shown["id"], "42");
    assert_eq!(shown["has_unsaved_changes"], false);
    assert_eq!(shown["draft_state"], "absent");
    assert_eq!(
        shown["display_form"],
        serde_json::json!({
            "post_title": "",
            "content": "",
            "tag_ids": [],
            "category_id": null,
            "is_public": true,
            "locale": "en",
            "created_at": null,
            "should_publish_medium": false
        })
    );
}

#[test]
fn test_show_with_server_projects_server_data() {
    let env = TestEnv::new();
    let server = env.write_json(
        "server.json",
        &serde_json::json!({
            "id": 42,
            "title": "From server",
            "tags": [{ "id": 9, "name": "z" }, { "id": 3, "name": "c" }]
        }),
    );

    let shown = env.json(&["show", "42", "--server", server.to_str().unwrap()]);
    assert_eq!(shown["has_unsaved_changes"], false);
    assert_eq!(shown["display_form"]["post_title"], "From server");
    // Server order survives in the display form
    assert_eq!(shown["display_form"]["tag_ids"], serde_json::json!([9, 3]));
    // No defaults applied to server data
    assert_eq!(shown["display_form"]["is_public"], serde_json::Value::Null);
    assert_eq!(shown["reconciliation"]["outcome"], "no_draft");
}

#[test]
fn test_show_primary_locale_override() {
    let env = TestEnv::new();

    let shown = env.json(&["show", "1", "--locale", "ko"]);
    assert_eq!(shown["display_form"]["locale"], "ko");
}

#[test]
fn test_show_human_output() {
    let env = TestEnv::new();

    env.pd()
        .args(["-H", "show", "42"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Post 42 (no local changes)"))
        .stdout(predicate::str::contains("Locale:   en"));
}

// === Edit ===

#[test]
fn test_edit_creates_persistent_draft() {
    let env = TestEnv::new();

    let edited = env.json(&["edit", "42", "--title", "Hello", "--tag", "3", "--tag", "1"]);
    assert_eq!(edited["created"], true);
    assert_eq!(edited["reconciliation"]["outcome"], "awaiting_snapshot");
    assert_eq!(edited["has_unsaved_changes"], true);
    assert!(env.drafts_file().exists());

    // A new process sees the same draft
    let shown = env.json(&["show", "42"]);
    assert_eq!(shown["has_unsaved_changes"], true);
    assert_eq!(shown["draft_state"], "present");
    assert_eq!(shown["display_form"]["post_title"], "Hello");
    assert_eq!(shown["display_form"]["tag_ids"], serde_json::json!([3, 1]));
}

#[test]
fn test_edit_persisted_record_shape() {
    let env = TestEnv::new();
    env.json(&["edit", "7", "--content", "body"]);

    let raw = fs::read_to_string(env.drafts_file()).unwrap();
    let record: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(record["version"], 1);
    assert_eq!(record["state"]["drafts"]["7"]["content"], "body");
}

#[test]
fn test_edit_matching_server_is_evicted_immediately() {
    let env = TestEnv::new();
    let server = env.write_json("server.json", &sample_server(42));

    let edited = env.json(&[
        "edit",
        "42",
        "--server",
        server.to_str().unwrap(),
        "--title",
        "T",
    ]);
    assert_eq!(edited["reconciliation"]["outcome"], "evicted");
    assert_eq!(edited["has_unsaved_changes"], false);

    let listed = env.json(&["list"]);
    assert_eq!(listed["count"], 0);
}

#[test]
fn test_edit_reordered_tags_still_match() {
    let env = TestEnv::new();
    let server = env.write_json(
        "server.json",
        &serde_json::json!({
            "id": 5,
            "title": "T",
            "tags": [{ "id": 2, "name": "a" }, { "id": 5, "name": "b" }]
        }),
    );

    let edited = env.json(&[
        "edit",
        "5",
        "--server",
        server.to_str().unwrap(),
        "--tag",
        "5",
        "--tag",
        "2",
    ]);
    assert_eq!(edited["reconciliation"]["outcome"], "evicted");
}

#[test]
fn test_edit_timestamp_in_other_zone_matches() {
    let env = TestEnv::new();
    let mut snapshot = sample_server(8);
    snapshot["created_at"] = serde_json::json!("2024-03-01T12:00:00.123Z");
    let server = env.write_json("server.json", &snapshot);

    let edited = env.json(&[
        "edit",
        "8",
        "--server",
        server.to_str().unwrap(),
        "--created-at",
        "2024-03-01T21:00:00+09:00",
    ]);
    assert_eq!(edited["reconciliation"]["outcome"], "evicted");
}

#[test]
fn test_edit_divergence_reports_fields() {
    let env = TestEnv::new();
    let server = env.write_json("server.json", &sample_server(42));

    let edited = env.json(&[
        "edit",
        "42",
        "--server",
        server.to_str().unwrap(),
        "--title",
        "Changed",
    ]);
    assert_eq!(edited["reconciliation"]["outcome"], "diverged");
    assert_eq!(
        edited["reconciliation"]["fields"],
        serde_json::json!(["post_title"])
    );
    assert_eq!(edited["display_form"]["tag_ids"], serde_json::json!([2]));
}

#[test]
fn test_edit_form_file_then_flags() {
    let env = TestEnv::new();
    let form = env.write_json(
        "form.json",
        &serde_json::json!({
            "post_title": "From file",
            "content": "file body",
            "category_id": 4
        }),
    );

    let edited = env.json(&[
        "edit",
        "3",
        "--form",
        form.to_str().unwrap(),
        "--title",
        "From flag",
    ]);
    assert_eq!(edited["display_form"]["post_title"], "From flag");
    assert_eq!(edited["display_form"]["content"], "file body");
    assert_eq!(edited["display_form"]["category_id"], 4);

    let cleared = env.json(&["edit", "3", "--no-category"]);
    assert_eq!(cleared["created"], false);
    assert_eq!(cleared["display_form"]["category_id"], serde_json::Value::Null);
    assert_eq!(cleared["display_form"]["content"], "file body");
}

// === Reconcile ===

#[test]
fn test_reconcile_evicts_once_server_catches_up() {
    let env = TestEnv::new();
    env.json(&["edit", "42", "--title", "T", "--tag", "2"]);

    let server = env.write_json("server.json", &sample_server(42));
    let outcome = env.json(&["reconcile", "42", "--server", server.to_str().unwrap()]);
    assert_eq!(outcome["id"], "42");
    assert_eq!(outcome["outcome"], "evicted");
    assert_eq!(outcome["has_unsaved_changes"], false);

    let shown = env.json(&["show", "42"]);
    assert_eq!(shown["draft_state"], "absent");
}

#[test]
fn test_reconcile_keeps_diverged_draft() {
    let env = TestEnv::new();
    env.json(&["edit", "42", "--title", "Mine"]);

    let server = env.write_json("server.json", &sample_server(42));
    let outcome = env.json(&["reconcile", "42", "--server", server.to_str().unwrap()]);
    assert_eq!(outcome["outcome"], "diverged");
    assert_eq!(outcome["has_unsaved_changes"], true);
}

#[test]
fn test_reconcile_rejects_server_copy_for_other_post() {
    let env = TestEnv::new();
    let server = env.write_json("server.json", &sample_server(99));

    env.pd()
        .args(["reconcile", "42", "--server", server.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

// === Reset / Saved ===

#[test]
fn test_reset_discards_draft() {
    let env = TestEnv::new();
    env.json(&["edit", "42", "--title", "Mine"]);

    let reset = env.json(&["reset", "42"]);
    assert_eq!(reset["cleared"], true);
    assert_eq!(env.json(&["show", "42"])["has_unsaved_changes"], false);

    let again = env.json(&["reset", "42"]);
    assert_eq!(again["cleared"], false);
}

#[test]
fn test_saved_clears_draft() {
    let env = TestEnv::new();
    env.json(&["edit", "42", "--title", "Mine"]);
    let server = env.write_json("server.json", &sample_server(42));

    let saved = env.json(&["saved", "42", "--server", server.to_str().unwrap()]);
    assert_eq!(saved["id"], "42");
    assert_eq!(saved["cleared_draft"], true);
    assert_eq!(saved["snapshot_updated"], true);
    assert_eq!(env.json(&["list"])["count"], 0);
}

// === List ===

#[test]
fn test_list_in_write_order_with_cap() {
    let env = TestEnv::new();
    for id in ["a", "b", "c"] {
        env.json(&["--max-drafts", "2", "edit", id, "--title", id]);
    }

    let listed = env.json(&["list"]);
    assert_eq!(listed["count"], 2);
    let ids: Vec<&str> = listed["drafts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["b", "c"]);
}

#[test]
fn test_list_human_empty() {
    let env = TestEnv::new();

    env.pd()
        .args(["list", "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No drafts."));
}

#[test]
fn test_corrupted_draft_file_starts_empty() {
    let env = TestEnv::new();
    fs::write(env.drafts_file(), "{ not valid json").unwrap();

    let listed = env.json(&["list"]);
    assert_eq!(listed["count"], 0);

    // And the store is usable again afterwards
    env.json(&["edit", "1", "--title", "fresh"]);
    assert_eq!(env.json(&["list"])["count"], 1);
}

// === Key ===

#[test]
fn test_key_server_and_local_agree() {
    let env = TestEnv::new();
    let server = env.write_json("server.json", &sample_server(42));
    let local = env.write_json(
        "local.json",
        &serde_json::json!({ "post_title": "T", "content": "", "tag_ids": [2] }),
    );

    let from_server = env.json(&["key", server.to_str().unwrap(), "--kind", "server"]);
    let from_local = env.json(&["key", local.to_str().unwrap(), "--kind", "local"]);
    assert_eq!(from_server["kind"], "server");
    assert_eq!(from_local["kind"], "local");
    assert_eq!(from_server["key"], from_local["key"]);
}

#[test]
fn test_key_human_prints_bare_key() {
    let env = TestEnv::new();
    let local = env.write_json("local.json", &serde_json::json!({}));

    env.pd()
        .args(["-H", "key", local.to_str().unwrap(), "--kind", "local"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(r#"{"post_title":"","content":"","tag_ids":[]"#));
}

// === Errors ===

#[test]
fn test_empty_id_is_rejected() {
    let env = TestEnv::new();

    env.pd()
        .args(["show", "  "])
        .assert()
        .failure()
        .stderr(predicate::str::contains(r#"{"error":"#));

    env.pd()
        .args(["-H", "reset", ""])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: Invalid ID format"));
}

#[test]
fn test_missing_server_file_fails() {
    let env = TestEnv::new();

    env.pd()
        .args(["show", "1", "--server", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read server snapshot"));
}

#[test]
fn test_zero_max_drafts_flag_fails() {
    let env = TestEnv::new();

    env.pd()
        .args(["--max-drafts", "0", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("max-drafts"));
}
