//! Integration tests for Redis tag invalidation and the save-event stream.

use alias_core::{
    AliasFields, AliasId, AliasRecord, AliasSaveEvent, CacheInvalidator, ContextId, Langcode,
    SaveHook, SaveOperation,
};
use storage::{RedisStreamSaveHook, RedisTagInvalidator};
use testing::{redis, unique_id};

#[tokio::test]
async fn test_invalidation_bumps_tag_version() {
    let Some(fixture) = redis().await else {
        eprintln!("Skipping Redis test: Docker not available");
        return;
    };

    let invalidator = RedisTagInvalidator::new(fixture.url())
        .await
        .expect("Failed to connect to Redis")
        .with_prefix(unique_id("tags"));

    assert_eq!(invalidator.tag_version("route_match").await.unwrap(), 0);

    invalidator.invalidate_tags(&["route_match"]).await.unwrap();
    invalidator
        .invalidate_tags(&["route_match", "other"])
        .await
        .unwrap();

    assert_eq!(invalidator.tag_version("route_match").await.unwrap(), 2);
    assert_eq!(invalidator.tag_version("other").await.unwrap(), 1);
}

#[tokio::test]
async fn test_invalid_url_is_a_connection_error() {
    let result = RedisTagInvalidator::new("not-a-url").await;
    assert!(matches!(
        result,
        Err(errors::StorageError::ConnectionError { .. })
    ));
}

fn update_event() -> AliasSaveEvent {
    let context = ContextId::new("one");
    AliasSaveEvent {
        operation: SaveOperation::Update,
        pid: AliasId::new(3),
        fields: AliasFields {
            source: "/a".to_string(),
            alias: "/one/A".to_string(),
            langcode: Langcode::new("en"),
            context: context.clone(),
        },
        original: Some(AliasRecord {
            pid: AliasId::new(3),
            source: "/a".to_string(),
            alias: "/A".to_string(),
            langcode: Langcode::new("en"),
            context,
        }),
    }
}

/// Every `event` field of `stream`, oldest first.
async fn stream_events(url: &str, stream: &str) -> Vec<AliasSaveEvent> {
    let client = redis::Client::open(url).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    let entries: Vec<(String, Vec<String>)> = redis::cmd("XRANGE")
        .arg(stream)
        .arg("-")
        .arg("+")
        .query_async(&mut conn)
        .await
        .unwrap();
    entries
        .into_iter()
        .map(|(_, fields)| {
            assert_eq!(fields[0], "event");
            serde_json::from_str(&fields[1]).unwrap()
        })
        .collect()
}

#[tokio::test]
async fn test_stream_hook_appends_json_events() {
    let Some(fixture) = redis().await else {
        eprintln!("Skipping Redis test: Docker not available");
        return;
    };
    let stream = unique_id("alias_events");
    let hook = RedisStreamSaveHook::new(fixture.url(), &stream)
        .await
        .expect("Failed to connect to Redis");

    let event = update_event();
    let id = hook.publish(&event).await.unwrap();
    assert!(id.contains('-'), "unexpected stream id {id}");

    let mut insert = event.clone();
    insert.operation = SaveOperation::Insert;
    insert.original = None;
    hook.on_save(&insert).await;

    assert_eq!(stream_events(fixture.url(), &stream).await, vec![event, insert]);
}

#[tokio::test]
async fn test_stream_hook_invalid_url_is_a_connection_error() {
    let result = RedisStreamSaveHook::new("not-a-url", "alias_events").await;
    assert!(matches!(
        result,
        Err(errors::StorageError::ConnectionError { .. })
    ));
}
