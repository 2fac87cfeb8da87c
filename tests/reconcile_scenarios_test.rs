//! Library-level tests of the draft lifecycle.
//!
//! These drive `ReconciliationController` directly, the way an editor
//! embedding the library would, against both the in-memory and the file
//! backend.

use postdraft::models::{DraftPatch, EntityId, LocalDraft, ServerSnapshot, TagRef};
use postdraft::normalize::Normalizer;
use postdraft::reconcile::{Reconciliation, ReconciliationController, SaveError};
use postdraft::storage::{DraftStore, MemoryBackend};
use std::thread;
use tempfile::TempDir;

fn post() -> EntityId {
    EntityId::new("17")
}

fn server_post() -> ServerSnapshot {
    ServerSnapshot {
        tags: vec![TagRef::new(2, "a")],
        created_at: Some("2024-01-01T00:00:00.000Z".to_string()),
        ..ServerSnapshot::new("17", "T")
    }
}

fn controller_over(backend: MemoryBackend) -> ReconciliationController {
    ReconciliationController::new(DraftStore::open(backend), Normalizer::default())
}

#[test]
fn test_editing_session_from_load_to_convergence() {
    let mut c = controller_over(MemoryBackend::new());
    let id = post();

    // Loading: nothing but defaults
    assert_eq!(c.display_form(&id), c.normalizer().default_form());
    c.receive_snapshot(&id, None).unwrap();

    // Server copy arrives, shown as-is
    c.receive_snapshot(&id, Some(server_post())).unwrap();
    let shown = c.display_form(&id);
    assert_eq!(shown.tag_ids, vec![2]);
    assert!(!c.has_unsaved_changes(&id));

    // User edits the title
    let edited = LocalDraft {
        post_title: "T2".to_string(),
        ..shown.clone()
    };
    let update = c.set_form(&id, edited).unwrap();
    assert!(update.created);
    assert!(c.has_unsaved_changes(&id));
    assert_eq!(c.display_form(&id).post_title, "T2");

    // ...and types it back
    let update = c.set_form(&id, shown.clone()).unwrap();
    assert_eq!(update.reconciliation, Reconciliation::Evicted);
    assert!(!c.has_unsaved_changes(&id));
    assert_eq!(c.display_form(&id), shown);
}

#[test]
fn test_reset_reverts_to_server_projection() {
    let mut c = controller_over(MemoryBackend::new());
    let id = post();
    c.receive_snapshot(&id, Some(server_post())).unwrap();
    c.set_form(&id, DraftPatch::new().with_content("draft body"))
        .unwrap();
    assert!(c.has_unsaved_changes(&id));

    assert!(c.clear_form(&id).unwrap());
    assert!(!c.has_unsaved_changes(&id));
    assert_eq!(
        Some(c.display_form(&id)),
        c.normalizer().project_server_to_display(Some(&server_post()))
    );
}

#[test]
fn test_corrupted_payload_starts_empty() {
    let backend = MemoryBackend::with_payload("\u{0}garbage{{");
    let c = controller_over(backend);

    assert!(c.store().is_empty());
    for raw in ["1", "17", "anything"] {
        assert!(!c.has_unsaved_changes(&EntityId::new(raw)));
    }
}

#[test]
fn test_drafts_survive_restart_with_file_backend() {
    let dir = TempDir::new().unwrap();
    let id = post();

    {
        let mut c = ReconciliationController::new(DraftStore::open_in(dir.path()), Normalizer::default());
        c.set_form(&id, DraftPatch::new().with_title("Crash me").with_tag_ids(vec![5, 1]))
            .unwrap();
    }

    let mut c = ReconciliationController::new(DraftStore::open_in(dir.path()), Normalizer::default());
    assert!(c.has_unsaved_changes(&id));
    let draft = c.display_form(&id);
    assert_eq!(draft.post_title, "Crash me");
    assert_eq!(draft.tag_ids, vec![5, 1]);

    // Server catches up with the same content in another tag order
    let caught_up = ServerSnapshot {
        tags: vec![TagRef::new(1, "x"), TagRef::new(5, "y")],
        is_public: Some(true),
        locale: Some("en".to_string()),
        should_publish_medium: Some(false),
        ..ServerSnapshot::new("17", "Crash me")
    };
    assert!(c.receive_snapshot(&id, Some(caught_up)).unwrap().evicted());

    let reopened = DraftStore::open_in(dir.path());
    assert!(reopened.is_empty());
}

#[test]
fn test_failed_save_keeps_draft() {
    let mut c = controller_over(MemoryBackend::new());
    let id = post();
    c.set_form(&id, DraftPatch::new().with_title("Unsent")).unwrap();

    let mut offline = |_: &EntityId, _: &LocalDraft| -> Result<Option<ServerSnapshot>, SaveError> {
        Err("network unreachable".into())
    };
    let err = c.save(&id, &mut offline).unwrap_err();
    assert!(err.to_string().contains("network unreachable"));
    assert_eq!(c.display_form(&id).post_title, "Unsent");

    let mut online = |id: &EntityId, form: &LocalDraft| -> Result<Option<ServerSnapshot>, SaveError> {
        Ok(Some(ServerSnapshot::new(id.clone(), form.post_title.clone())))
    };
    let outcome = c.save(&id, &mut online).unwrap();
    assert!(outcome.cleared_draft);
    assert_eq!(c.display_form(&id).post_title, "Unsent");
    assert!(!c.has_unsaved_changes(&id));
}

#[test]
fn test_capacity_evicts_least_recently_written() {
    let store = DraftStore::in_memory().with_max_drafts(Some(2));
    let mut c = ReconciliationController::new(store, Normalizer::default());

    for raw in ["a", "b"] {
        c.set_form(&EntityId::new(raw), DraftPatch::new().with_title(raw))
            .unwrap();
    }
    // Rewriting "a" makes "b" the oldest
    c.set_form(&EntityId::new("a"), DraftPatch::new().with_content("more"))
        .unwrap();
    c.set_form(&EntityId::new("c"), DraftPatch::new().with_title("c"))
        .unwrap();

    let ids: Vec<&str> = c.store().ids().map(|id| id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
}

#[test]
fn test_shared_controller_across_threads() {
    let shared = controller_over(MemoryBackend::new()).into_shared();

    let handles: Vec<_> = (0..4u64)
        .map(|n| {
            let shared = shared.clone();
            thread::spawn(move || {
                let mut c = shared.lock().unwrap();
                c.set_form(&EntityId::from(n), DraftPatch::new().with_title(format!("post {}", n)))
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let c = shared.lock().unwrap();
    assert_eq!(c.store().len(), 4);
    assert_eq!(c.display_form(&EntityId::from(3u64)).post_title, "post 3");
}
