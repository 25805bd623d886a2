use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use firesugar::value::{field_map, Value};
use firesugar::{
    Batch, Collection, Document, DocumentRegistry, DocumentStore, Entity, IterateOptions,
    MemoryStore, NameMap, QueryOptions, TriggerEvent, TriggerPayload, WriteOutcome, WriteParams,
};

fn store() -> Arc<dyn DocumentStore> {
    Arc::new(MemoryStore::new())
}

#[tokio::test]
async fn parameterized_document_round_trip() {
    let store = store();
    let user = Document::new("users/{userId}", Arc::clone(&store)).unwrap();

    let payload = TriggerPayload::Fields(field_map([("userId", Value::from_string("kole"))]));
    let kole = user.instance(&payload, &NameMap::new()).unwrap();
    assert_eq!(*kole.path(), "users/kole");

    kole.set(field_map([("admin", Value::from_bool(true))]), WriteParams::default())
        .await
        .unwrap();

    let snapshot = kole.get().await.unwrap();
    assert_eq!(snapshot.data(), Some(&field_map([("admin", Value::from_bool(true))])));
}

#[tokio::test]
async fn iterate_observes_strictly_increasing_indexes_under_latency() {
    let store = store();
    let scores = Collection::new("scores", Arc::clone(&store)).unwrap();
    for index in 0..33 {
        scores
            .doc(&format!("s{index:02}"))
            .set(
                field_map([("value", Value::from_integer(index as i64))]),
                WriteParams::default(),
            )
            .await
            .unwrap();
    }

    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);
    let visited = scores
        .iterate(
            move |document, index| {
                let sink = Arc::clone(&sink);
                let value = document.field("value").cloned();
                async move {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    sink.lock().unwrap().push((index, value));
                    Ok(())
                }
            },
            IterateOptions {
                limit: 10,
                order_by: Some("value".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(visited, 33);
    let observed = observed.lock().unwrap();
    for (position, (index, value)) in observed.iter().enumerate() {
        assert_eq!(*index, position);
        assert_eq!(value.as_ref(), Some(&Value::from_integer(position as i64)));
    }
}

#[tokio::test]
async fn batched_writes_flow_through_documents() {
    let store = store();
    let batch = Batch::new(Arc::clone(&store));
    let users = Collection::new("users", Arc::clone(&store)).unwrap();

    for index in 0..3 {
        let outcome = users
            .doc(&format!("u{index}"))
            .set(
                field_map([("n", Value::from_integer(index as i64))]),
                WriteParams::batched(&batch),
            )
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Queued(index + 1));
    }

    assert!(users.get(&QueryOptions::new()).await.unwrap().is_empty());
    batch.commit().await.unwrap();
    assert_eq!(users.get(&QueryOptions::new()).await.unwrap().len(), 3);
}

#[tokio::test]
async fn counters_reconcile_through_increments() {
    let store = store();
    let group = Document::new("groups/rust", Arc::clone(&store)).unwrap();

    // Seeding path: the first increment creates the document.
    group.increment_field("users", Value::from_integer(1)).await.unwrap();
    group.increment_field("users", Value::from_integer(1)).await.unwrap();
    group.increment_field("users", Value::from_integer(-1)).await.unwrap();

    let snapshot = group.get().await.unwrap();
    assert_eq!(snapshot.field("users"), Some(&Value::from_integer(1)));
}

#[tokio::test]
async fn exported_triggers_drive_dependent_documents() {
    let store = store();
    let mut registry = DocumentRegistry::new();
    registry
        .create_documents(
            [
                ("sentInvite", "users/{userId}/sentInvites/{inviteId}"),
                ("receivedInvite", "users/{inviteId}/receivedInvites/{userId}"),
            ],
            &store,
        )
        .unwrap();

    // When a sent invite appears, materialize the mirrored received invite.
    let received_template = registry.get("receivedInvite").unwrap().clone();
    registry.get_mut("sentInvite").unwrap().on_create(move |event: TriggerEvent| {
        let received = received_template.clone();
        Box::pin(async move {
            let mirrored = received.instance(&event.payload, &NameMap::new())?;
            let data = event.payload.extract_data().unwrap_or_default();
            mirrored.set(data, WriteParams::default()).await?;
            Ok(())
        })
    });

    let exports = registry.exports();
    assert_eq!(exports.len(), 1);
    assert_eq!(exports[0].name, "sentInviteOnCreate");

    let event = TriggerEvent::new(TriggerPayload::Fields(field_map([
        ("userId", Value::from_string("kole")),
        ("inviteId", Value::from_string("zach")),
    ])));
    exports[0].dispatch(&event).await.unwrap();

    let mirrored = Document::new("users/zach/receivedInvites/kole", store).unwrap();
    assert!(mirrored.get().await.unwrap().exists());
}

#[tokio::test]
async fn iterate_abort_stops_all_later_pages() {
    let store = store();
    let items = Collection::new("items", Arc::clone(&store)).unwrap();
    for index in 0..25 {
        items
            .doc(&format!("i{index:02}"))
            .set(field_map([]), WriteParams::default())
            .await
            .unwrap();
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let result = items
        .iterate(
            move |_document, index| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if index == 7 {
                        Err(firesugar::error::internal("stop"))
                    } else {
                        Ok(())
                    }
                }
            },
            IterateOptions {
                limit: 5,
                order_by: None,
            },
        )
        .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 8);
}
