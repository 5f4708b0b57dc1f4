use super::{JsonStore, RecordKind};
use autoreply_core::{rules::KeywordRule, session::SessionId};
use std::collections::HashSet;

async fn test_store() -> (tempfile::TempDir, JsonStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonStore::open(dir.path()).await.unwrap();
    (dir, store)
}

fn s1() -> SessionId {
    SessionId::new("session1")
}

#[tokio::test]
async fn test_keywords_round_trip_preserves_order_and_null_image() {
    let (_dir, store) = test_store().await;
    let rules = vec![
        KeywordRule::new("zeta", "last letter"),
        KeywordRule::new("alpha", "first letter").with_image("data:image/png;base64,aGk="),
        KeywordRule::new("mid", ""),
    ];
    store.save_keywords(&s1(), &rules).await.unwrap();

    let loaded = store.load_keywords(&s1()).await;
    assert_eq!(loaded, rules);

    let raw = std::fs::read_to_string(store.path(RecordKind::Keywords, &s1())).unwrap();
    assert!(raw.contains("\"image\": null"));
}

#[tokio::test]
async fn test_missing_files_yield_fallbacks() {
    let (_dir, store) = test_store().await;
    assert!(store.load_keywords(&s1()).await.is_empty());
    assert_eq!(store.load_default_message(&s1()).await, "");
    assert!(store.load_sent_defaults(&s1()).await.is_empty());
}

#[tokio::test]
async fn test_malformed_file_falls_back() {
    let (_dir, store) = test_store().await;
    std::fs::write(store.path(RecordKind::Keywords, &s1()), "{not json").unwrap();
    std::fs::write(store.path(RecordKind::DefaultMessage, &s1()), "[1,2,3]").unwrap();
    std::fs::write(store.path(RecordKind::SentDefaults, &s1()), "\"oops\"").unwrap();

    assert!(store.load_keywords(&s1()).await.is_empty());
    assert_eq!(store.load_default_message(&s1()).await, "");
    assert!(store.load_sent_defaults(&s1()).await.is_empty());
}

#[tokio::test]
async fn test_default_message_format() {
    let (_dir, store) = test_store().await;
    store.save_default_message(&s1(), "Halo!").await.unwrap();
    let raw = std::fs::read_to_string(store.path(RecordKind::DefaultMessage, &s1())).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json, serde_json::json!({"message": "Halo!"}));
    assert_eq!(store.load_default_message(&s1()).await, "Halo!");
}

#[tokio::test]
async fn test_default_message_without_field_is_empty() {
    let (_dir, store) = test_store().await;
    std::fs::write(store.path(RecordKind::DefaultMessage, &s1()), "{}").unwrap();
    assert_eq!(store.load_default_message(&s1()).await, "");
}

#[tokio::test]
async fn test_sent_defaults_written_as_sorted_array() {
    let (_dir, store) = test_store().await;
    let sent: HashSet<String> = ["628222@c.us", "628111@c.us"]
        .into_iter()
        .map(String::from)
        .collect();
    store.save_sent_defaults(&s1(), &sent).await.unwrap();

    let raw = std::fs::read_to_string(store.path(RecordKind::SentDefaults, &s1())).unwrap();
    let json: Vec<String> = serde_json::from_str(&raw).unwrap();
    assert_eq!(json, vec!["628111@c.us", "628222@c.us"]);
    assert_eq!(store.load_sent_defaults(&s1()).await, sent);
}

#[tokio::test]
async fn test_seed_creates_missing_files_only() {
    let (_dir, store) = test_store().await;
    store
        .save_keywords(&s1(), &[KeywordRule::new("keep", "me")])
        .await
        .unwrap();

    store.seed(&s1(), "Welcome!").await.unwrap();

    for kind in RecordKind::ALL {
        assert!(store.exists(kind, &s1()).await, "{kind:?} should exist");
    }
    assert_eq!(store.load_keywords(&s1()).await.len(), 1);
    assert_eq!(store.load_default_message(&s1()).await, "Welcome!");

    // Seeding again does not overwrite an edited message.
    store.save_default_message(&s1(), "Edited").await.unwrap();
    store.seed(&s1(), "Welcome!").await.unwrap();
    assert_eq!(store.load_default_message(&s1()).await, "Edited");
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let (_dir, store) = test_store().await;
    let s2 = SessionId::new("session2");
    store.save_default_message(&s1(), "one").await.unwrap();
    store.save_default_message(&s2, "two").await.unwrap();
    assert_eq!(store.load_default_message(&s1()).await, "one");
    assert_eq!(store.load_default_message(&s2).await, "two");
    assert_eq!(
        store.path(RecordKind::Keywords, &s2).file_name().unwrap(),
        "keywords_session2.json"
    );
}

#[tokio::test]
async fn test_concurrent_saves_leave_valid_file() {
    let (_dir, store) = test_store().await;
    let mut handles = Vec::new();
    for i in 0..20 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let rules = vec![KeywordRule::new(&format!("k{i}"), "r")];
            store.save_keywords(&SessionId::new("session1"), &rules).await
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }
    let loaded = store.load_keywords(&s1()).await;
    assert_eq!(loaded.len(), 1);
    assert!(loaded[0].keyword.starts_with('k'));
}

#[tokio::test]
async fn test_load_session_combines_records() {
    let (_dir, store) = test_store().await;
    store.seed(&s1(), "hi").await.unwrap();
    let records = store.load_session(&s1()).await;
    assert!(records.keywords.is_empty());
    assert_eq!(records.default_message, "hi");
    assert!(records.sent_defaults.is_empty());
}
