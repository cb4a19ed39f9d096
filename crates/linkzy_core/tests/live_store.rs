use linkzy_core::db::open_db_in_memory;
use linkzy_core::model::record::{Fields, RecordId, SortDirection};
use linkzy_core::store::{
    ChangeKind, Listener, ManualClock, OrderBy, RealtimeStore, RecordSet, SqliteLiveStore,
    StreamEvent,
};
use linkzy_core::{derive_pair_key, PairKey, UserId};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn scope(a: &str, b: &str) -> PairKey {
    derive_pair_key(&UserId::parse(a).unwrap(), &UserId::parse(b).unwrap())
}

fn fields(value: serde_json::Value) -> Fields {
    value.as_object().cloned().unwrap()
}

fn store_with_clock(start_ms: i64) -> (SqliteLiveStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start_ms));
    let store = SqliteLiveStore::with_clock(open_db_in_memory().unwrap(), clock.clone());
    (store, clock)
}

/// Collects every snapshot pushed to a subscription.
fn recorder() -> (Arc<Mutex<Vec<RecordSet>>>, Listener) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let listener: Listener = Box::new(move |event: StreamEvent| match event {
        StreamEvent::Snapshot(set) => sink.lock().unwrap().push(set),
        StreamEvent::Error(err) => panic!("unexpected stream error: {err}"),
    });
    (seen, listener)
}

fn ids(set: &RecordSet) -> Vec<RecordId> {
    set.records.iter().map(|record| record.id.clone()).collect()
}

#[test]
fn descending_stream_yields_newest_first() {
    let (store, clock) = store_with_clock(1_000);
    let scope = scope("u1", "u2");

    let t1 = store.create(&scope, "expenses", fields(json!({"n": 1}))).unwrap();
    clock.set(2_000);
    let t2 = store.create(&scope, "expenses", fields(json!({"n": 2}))).unwrap();
    clock.set(3_000);
    let t3 = store.create(&scope, "expenses", fields(json!({"n": 3}))).unwrap();

    let (seen, listener) = recorder();
    let _subscription = store.subscribe(
        &scope,
        "expenses",
        OrderBy::timestamp(SortDirection::Descending),
        listener,
    );

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1, "initial snapshot only");
    assert_eq!(ids(&seen[0]), vec![t3.clone(), t2.clone(), t1.clone()]);

    let ascending = store
        .snapshot(&scope, "expenses", &OrderBy::timestamp(SortDirection::Ascending))
        .unwrap();
    let ascending: Vec<RecordId> = ascending.into_iter().map(|record| record.id).collect();
    assert_eq!(ascending, vec![t1, t2, t3]);
}

#[test]
fn create_update_delete_leaves_record_absent() {
    let (store, clock) = store_with_clock(10);
    let scope = scope("u1", "u2");
    let (seen, listener) = recorder();
    let _subscription = store.subscribe(
        &scope,
        "tasks",
        OrderBy::timestamp(SortDirection::Descending),
        listener,
    );

    let id = store
        .create(&scope, "tasks", fields(json!({"text": "x", "completed": false})))
        .unwrap();
    clock.advance(1);
    store
        .update(&scope, "tasks", &id, fields(json!({"completed": true})))
        .unwrap();
    clock.advance(1);
    store.delete(&scope, "tasks", &id).unwrap();

    let snapshots = seen.lock().unwrap().clone();
    let kinds: Vec<Vec<ChangeKind>> = snapshots
        .iter()
        .map(|set| set.changes.iter().map(|change| change.kind).collect())
        .collect();
    assert_eq!(
        kinds,
        vec![
            vec![],
            vec![ChangeKind::Added],
            vec![ChangeKind::Modified],
            vec![ChangeKind::Removed],
        ]
    );
    assert!(snapshots.last().unwrap().records.is_empty());
    assert!(store
        .snapshot(&scope, "tasks", &OrderBy::timestamp(SortDirection::Ascending))
        .unwrap()
        .is_empty());

    // Deleting again is a no-op.
    store.delete(&scope, "tasks", &id).unwrap();
    assert!(seen.lock().unwrap().last().unwrap().changes.is_empty());
}

#[test]
fn pushes_stay_inside_scope_and_collection() {
    let store = SqliteLiveStore::open_in_memory().unwrap();
    let ours = scope("u1", "u2");
    let theirs = scope("u3", "u4");
    let (seen, listener) = recorder();
    let _subscription = store.subscribe(
        &ours,
        "messages",
        OrderBy::timestamp(SortDirection::Ascending),
        listener,
    );

    store
        .create(&theirs, "messages", fields(json!({"text": "other pair"})))
        .unwrap();
    store
        .create(&ours, "tasks", fields(json!({"text": "other feature"})))
        .unwrap();
    assert_eq!(seen.lock().unwrap().len(), 1);

    store
        .create(&ours, "messages", fields(json!({"text": "hi"})))
        .unwrap();
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].records.len(), 1);
}

#[test]
fn upsert_merges_into_fixed_record() {
    let store = SqliteLiveStore::open_in_memory().unwrap();
    let scope = scope("u1", "u2");
    let doc = RecordId::fixed("editor");

    store
        .upsert(&scope, "docs", &doc, fields(json!({"content": "a", "editedBy": "u1"})))
        .unwrap();
    store
        .upsert(&scope, "docs", &doc, fields(json!({"content": "ab"})))
        .unwrap();

    let records = store
        .snapshot(&scope, "docs", &OrderBy::timestamp(SortDirection::Ascending))
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].fields["content"], "ab");
    assert_eq!(records[0].fields["editedBy"], "u1");
}

#[test]
fn field_ordering_sorts_by_json_value() {
    let store = SqliteLiveStore::open_in_memory().unwrap();
    let scope = scope("u1", "u2");
    for amount in [30, 10, 20] {
        store
            .create(&scope, "expenses", fields(json!({"amount": amount})))
            .unwrap();
    }

    let records = store
        .snapshot(
            &scope,
            "expenses",
            &OrderBy::field("amount", SortDirection::Ascending),
        )
        .unwrap();
    let amounts: Vec<i64> = records
        .iter()
        .map(|record| record.fields["amount"].as_i64().unwrap())
        .collect();
    assert_eq!(amounts, vec![10, 20, 30]);
}

#[test]
fn dropped_subscription_receives_nothing_more() {
    let store = SqliteLiveStore::open_in_memory().unwrap();
    let scope = scope("u1", "u2");
    let (seen, listener) = recorder();
    let subscription = store.subscribe(
        &scope,
        "playlist",
        OrderBy::timestamp(SortDirection::Ascending),
        listener,
    );
    assert_eq!(store.listener_count(), 1);
    drop(subscription);
    assert_eq!(store.listener_count(), 0);

    store
        .create(&scope, "playlist", fields(json!({"title": "song"})))
        .unwrap();
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn invalid_collection_is_reported_on_the_stream() {
    let store = SqliteLiveStore::open_in_memory().unwrap();
    let errors = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&errors);
    let _subscription = store.subscribe(
        &scope("u1", "u2"),
        "../messages",
        OrderBy::timestamp(SortDirection::Ascending),
        Box::new(move |event: StreamEvent| {
            if matches!(event, StreamEvent::Error(_)) {
                *sink.lock().unwrap() += 1;
            }
        }),
    );
    assert_eq!(*errors.lock().unwrap(), 1);
}

#[test]
fn concurrent_writers_leave_listener_on_latest_snapshot() {
    for _ in 0..20 {
        let store = Arc::new(SqliteLiveStore::open_in_memory().unwrap());
        let scope = scope("u1", "u2");
        let last_len = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&last_len);
        let _subscription = store.subscribe(
            &scope,
            "messages",
            OrderBy::timestamp(SortDirection::Ascending),
            Box::new(move |event: StreamEvent| {
                if let StreamEvent::Snapshot(set) = event {
                    *sink.lock().unwrap() = set.records.len();
                }
            }),
        );

        let writers: Vec<_> = (0..4)
            .map(|writer| {
                let store = Arc::clone(&store);
                let scope = scope.clone();
                std::thread::spawn(move || {
                    for n in 0..20 {
                        store
                            .create(&scope, "messages", fields(json!({"w": writer, "n": n})))
                            .unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        assert_eq!(*last_len.lock().unwrap(), 80);
    }
}
