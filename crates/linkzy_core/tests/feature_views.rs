use linkzy_core::binding::{BindingStatus, SharedStore};
use linkzy_core::model::feature::{Assignee, ExpenseCategory, Mood, Platform};
use linkzy_core::model::record::{Fields, RecordId};
use linkzy_core::store::{
    BlobStore, FsBlobStore, Listener, ManualClock, OrderBy, RealtimeStore, SqliteLiveStore,
    StoreError, StoreResult, StreamEvent, Subscription,
};
use linkzy_core::view::{
    ChatView, EditorView, ExpensesView, FeatureViews, MemoriesView, MoodView, PlaylistView,
    TasksView,
};
use linkzy_core::{derive_pair_key, AppSession, Identity, PairKey, UserId, ViewError, ViewState};
use linkzy_core::model::record::StoredRecord;
use linkzy_core::store::RecordSet;
use serde_json::json;
use std::sync::{Arc, Mutex};

fn uid(value: &str) -> UserId {
    UserId::parse(value).unwrap()
}

fn session(me: &str, partner: Option<&str>) -> AppSession {
    let mut session = AppSession::new();
    session.set_user(Some(Identity::new(uid(me), None)));
    if let Some(partner) = partner {
        session.set_partner(uid(partner));
    }
    session
}

fn live_store() -> Arc<SqliteLiveStore> {
    Arc::new(SqliteLiveStore::open_in_memory().unwrap())
}

fn shared(store: &Arc<SqliteLiveStore>) -> SharedStore {
    store.clone()
}

fn scope(a: &str, b: &str) -> PairKey {
    derive_pair_key(&uid(a), &uid(b))
}

/// Store whose streams fail and whose writes are refused.
struct OfflineStore;

impl RealtimeStore for OfflineStore {
    fn subscribe(
        &self,
        _scope: &PairKey,
        _collection: &str,
        _order: OrderBy,
        mut listener: Listener,
    ) -> Subscription {
        listener(StreamEvent::Error(StoreError::Unavailable(
            "permission denied".to_string(),
        )));
        Subscription::new(|| {})
    }

    fn create(&self, _: &PairKey, _: &str, _: Fields) -> StoreResult<RecordId> {
        Err(StoreError::Unavailable("offline".to_string()))
    }

    fn update(&self, _: &PairKey, _: &str, _: &RecordId, _: Fields) -> StoreResult<()> {
        Err(StoreError::Unavailable("offline".to_string()))
    }

    fn upsert(&self, _: &PairKey, _: &str, _: &RecordId, _: Fields) -> StoreResult<()> {
        Err(StoreError::Unavailable("offline".to_string()))
    }

    fn delete(&self, _: &PairKey, _: &str, _: &RecordId) -> StoreResult<()> {
        Err(StoreError::Unavailable("offline".to_string()))
    }
}

/// Store that hands its listener to the test so pushes can be scripted.
#[derive(Default)]
struct ScriptedStore {
    listener: Mutex<Option<Listener>>,
}

impl ScriptedStore {
    fn push(&self, event: StreamEvent) {
        let mut listener = self.listener.lock().unwrap();
        (listener.as_mut().expect("subscribed"))(event);
    }
}

impl RealtimeStore for ScriptedStore {
    fn subscribe(
        &self,
        _scope: &PairKey,
        _collection: &str,
        _order: OrderBy,
        listener: Listener,
    ) -> Subscription {
        *self.listener.lock().unwrap() = Some(listener);
        Subscription::new(|| {})
    }

    fn create(&self, _: &PairKey, _: &str, _: Fields) -> StoreResult<RecordId> {
        Err(StoreError::Unavailable("read only".to_string()))
    }

    fn update(&self, _: &PairKey, _: &str, _: &RecordId, _: Fields) -> StoreResult<()> {
        Err(StoreError::Unavailable("read only".to_string()))
    }

    fn upsert(&self, _: &PairKey, _: &str, _: &RecordId, _: Fields) -> StoreResult<()> {
        Err(StoreError::Unavailable("read only".to_string()))
    }

    fn delete(&self, _: &PairKey, _: &str, _: &RecordId) -> StoreResult<()> {
        Err(StoreError::Unavailable("read only".to_string()))
    }
}

fn message_row(id: &str, text: &str, at: i64) -> StoredRecord {
    StoredRecord {
        id: RecordId::fixed(id),
        fields: json!({"text": text, "senderId": "u2"})
            .as_object()
            .cloned()
            .unwrap(),
        timestamp: at,
        updated_at: at,
    }
}

fn snapshot(records: Vec<StoredRecord>) -> StreamEvent {
    StreamEvent::Snapshot(RecordSet {
        records,
        changes: Vec::new(),
    })
}

#[test]
fn both_partners_see_each_others_messages_in_order() {
    let store = live_store();
    let mut mine = ChatView::new(shared(&store));
    let mut theirs = ChatView::new(shared(&store));
    mine.sync_scope(&session("u1", Some("u2")));
    theirs.sync_scope(&session("u2", Some("u1")));

    mine.set_draft("hello");
    mine.send().unwrap();
    assert_eq!(mine.draft(), "");
    theirs.set_draft("  hi back  ");
    theirs.send().unwrap();

    let messages = theirs.messages();
    let texts: Vec<&str> = messages.iter().map(|m| m.data.text.as_str()).collect();
    assert_eq!(texts, vec!["hello", "hi back"]);
    assert!(!theirs.is_mine(&messages[0]));
    assert!(theirs.is_mine(&messages[1]));
    assert_eq!(mine.messages().len(), 2);
}

#[test]
fn submit_without_scope_keeps_input() {
    let store = live_store();
    let mut chat = ChatView::new(shared(&store));
    assert_eq!(chat.sync_scope(&session("u1", None)), ViewState::NoScope);
    assert_eq!(store.listener_count(), 0);

    chat.set_draft("anyone there?");
    assert!(matches!(chat.send(), Err(ViewError::NoScope)));
    assert_eq!(chat.draft(), "anyone there?");
}

#[test]
fn blank_input_is_rejected_and_kept() {
    let store = live_store();
    let mut tasks = TasksView::new(shared(&store));
    tasks.sync_scope(&session("u1", Some("u2")));
    tasks.set_input("   ");
    assert!(matches!(tasks.add_task(), Err(ViewError::InvalidInput(_))));
    assert_eq!(tasks.input(), "   ");
    assert!(tasks.tasks().is_empty());
}

#[test]
fn partner_cleared_releases_subscription_and_ignores_old_scope() {
    let store = live_store();
    let mut chat = ChatView::new(shared(&store));
    chat.sync_scope(&session("u1", Some("u2")));
    chat.set_draft("before");
    chat.send().unwrap();
    assert_eq!(store.listener_count(), 1);

    assert_eq!(chat.sync_scope(&session("u1", None)), ViewState::NoScope);
    assert_eq!(store.listener_count(), 0);

    store
        .create(
            &scope("u1", "u2"),
            "messages",
            json!({"text": "late", "senderId": "u2"})
                .as_object()
                .cloned()
                .unwrap(),
        )
        .unwrap();
    assert!(chat.messages().is_empty());
    assert!(chat.status().is_none());
}

#[test]
fn switching_partner_rebinds_to_the_new_scope() {
    let store = live_store();
    let mut tasks = TasksView::new(shared(&store));
    tasks.sync_scope(&session("u1", Some("u2")));
    tasks.set_input("old pair task");
    tasks.add_task().unwrap();

    tasks.sync_scope(&session("u1", Some("u3")));
    assert_eq!(store.listener_count(), 1);
    assert!(tasks.tasks().is_empty());

    store
        .create(
            &scope("u1", "u2"),
            "tasks",
            json!({"text": "stale", "createdBy": "u2"})
                .as_object()
                .cloned()
                .unwrap(),
        )
        .unwrap();
    assert!(tasks.tasks().is_empty());
}

#[test]
fn subscription_failure_becomes_disconnected_status() {
    let mut expenses = ExpensesView::new(Arc::new(OfflineStore));
    assert_eq!(
        expenses.sync_scope(&session("u1", Some("u2"))),
        ViewState::Subscribed
    );
    match expenses.status() {
        Some(BindingStatus::Disconnected { message }) => {
            assert!(message.contains("permission denied"))
        }
        other => panic!("unexpected status: {other:?}"),
    }
    assert!(expenses.expenses().is_empty());
}

#[test]
fn stream_error_after_live_keeps_last_good_snapshot() {
    let store = Arc::new(ScriptedStore::default());
    let mut chat = ChatView::new(store.clone());
    chat.sync_scope(&session("u1", Some("u2")));
    assert_eq!(chat.status(), Some(BindingStatus::Connecting));

    store.push(snapshot(vec![message_row("m1", "hello", 1)]));
    assert_eq!(chat.status(), Some(BindingStatus::Live));

    store.push(StreamEvent::Error(StoreError::Unavailable(
        "network lost".to_string(),
    )));
    match chat.status() {
        Some(BindingStatus::Disconnected { message }) => assert!(message.contains("network lost")),
        other => panic!("unexpected status: {other:?}"),
    }
    let texts: Vec<String> = chat.messages().into_iter().map(|m| m.data.text).collect();
    assert_eq!(texts, vec!["hello"]);

    store.push(snapshot(vec![
        message_row("m1", "hello", 1),
        message_row("m2", "late", 2),
    ]));
    assert_eq!(chat.messages().len(), 1);
    assert!(matches!(
        chat.status(),
        Some(BindingStatus::Disconnected { .. })
    ));
}

#[test]
fn mutation_failure_keeps_input() {
    let mut expenses = ExpensesView::new(Arc::new(OfflineStore));
    expenses.sync_scope(&session("u1", Some("u2")));
    expenses.set_title("dinner");
    expenses.set_amount("42");

    assert!(matches!(
        expenses.add_expense(),
        Err(ViewError::Mutation(StoreError::Unavailable(_)))
    ));
    assert_eq!(expenses.title(), "dinner");
    assert_eq!(expenses.amount(), "42");
}

#[test]
fn tasks_toggle_delete_and_stats() {
    let store = live_store();
    let mut tasks = TasksView::new(shared(&store));
    tasks.sync_scope(&session("u1", Some("u2")));

    tasks.set_assignee(Assignee::Both);
    tasks.set_input("plan trip");
    let trip = tasks.add_task().unwrap();
    tasks.set_input("buy milk");
    tasks.add_task().unwrap();
    assert_eq!(tasks.assignee(), Assignee::Both);

    tasks.toggle_complete(&trip).unwrap();
    let stats = tasks.stats();
    assert_eq!((stats.total, stats.completed), (2, 1));

    tasks.toggle_complete(&trip).unwrap();
    assert_eq!(tasks.stats().completed, 0);

    tasks.delete_task(&trip).unwrap();
    assert_eq!(tasks.stats().total, 1);
    assert!(matches!(
        tasks.toggle_complete(&trip),
        Err(ViewError::UnknownRecord(_))
    ));
}

#[test]
fn mood_is_tracked_per_partner() {
    let store = live_store();
    let mut mine = MoodView::new(shared(&store));
    let mut theirs = MoodView::new(shared(&store));
    mine.sync_scope(&session("u1", Some("u2")));
    theirs.sync_scope(&session("u2", Some("u1")));

    assert_eq!(mine.my_mood(), Mood::Happy);
    assert_eq!(mine.partner_mood(), Mood::Happy);

    mine.set_my_mood(Mood::Sleepy).unwrap();
    theirs.set_my_mood(Mood::InLove).unwrap();
    mine.set_my_mood(Mood::Sad).unwrap();

    assert_eq!(mine.my_mood(), Mood::Sad);
    assert_eq!(mine.partner_mood(), Mood::InLove);
    assert_eq!(theirs.partner_mood(), Mood::Sad);
}

#[test]
fn expenses_total_and_chronological_series() {
    let clock = Arc::new(ManualClock::new(100));
    let store: Arc<SqliteLiveStore> = Arc::new(SqliteLiveStore::with_clock(
        linkzy_core::open_db_in_memory().unwrap(),
        clock.clone(),
    ));
    let mut expenses = ExpensesView::new(shared(&store));
    expenses.sync_scope(&session("u1", Some("u2")));

    for (title, amount) in [("coffee", "4.5"), ("train", "20"), ("movie", "12")] {
        expenses.set_title(title);
        expenses.set_amount(amount);
        expenses.set_category(ExpenseCategory::Fun);
        expenses.add_expense().unwrap();
        clock.advance(10);
    }
    assert_eq!(expenses.title(), "");
    assert_eq!(expenses.amount(), "");

    let titles: Vec<String> = expenses
        .expenses()
        .into_iter()
        .map(|expense| expense.data.title)
        .collect();
    assert_eq!(titles, vec!["movie", "train", "coffee"]);
    assert_eq!(expenses.total(), 36.5);
    assert_eq!(expenses.amount_series(), vec![4.5, 20.0, 12.0]);

    expenses.set_title("rent");
    expenses.set_amount("a lot");
    assert!(matches!(
        expenses.add_expense(),
        Err(ViewError::InvalidInput(_))
    ));
    assert_eq!(expenses.title(), "rent");
}

#[test]
fn playlist_entries_link_to_search() {
    let store = live_store();
    let mut playlist = PlaylistView::new(shared(&store));
    playlist.sync_scope(&session("u1", Some("u2")));

    playlist.set_platform(Platform::Spotify);
    playlist.set_query("first dance");
    playlist.add_entry().unwrap();
    playlist.set_platform(Platform::Youtube);
    playlist.set_query("road trip");
    playlist.add_entry().unwrap();
    assert_eq!(playlist.query(), "");

    let entries = playlist.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].data.url, "https://open.spotify.com/search/first%20dance");
    assert_eq!(entries[1].data.platform, Platform::Youtube);
    assert_eq!(entries[1].data.added_by, uid("u1"));
}

#[test]
fn memories_upload_then_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = live_store();
    let blobs = Arc::new(FsBlobStore::new(dir.path()));
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let mut memories = MemoriesView::new(shared(&store), blobs, clock);
    memories.sync_scope(&session("u2", Some("u1")));

    let id = memories.upload("beach day.jpg", b"jpeg").unwrap();
    let listed = memories.memories();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].data.uploader, uid("u2"));
    assert!(listed[0]
        .data
        .url
        .ends_with("pairs/u1_u2/memories/1700000000000_beach_day.jpg"));
    assert!(dir
        .path()
        .join("pairs/u1_u2/memories/1700000000000_beach_day.jpg")
        .exists());

    memories.describe(&id, " sunset ").unwrap();
    assert_eq!(memories.memories()[0].data.description, "sunset");
}

#[test]
fn failed_upload_creates_no_record() {
    struct RefusingBlobs;
    impl BlobStore for RefusingBlobs {
        fn upload_blob(&self, _path: &str, _bytes: &[u8]) -> StoreResult<String> {
            Err(StoreError::Unavailable("quota exceeded".to_string()))
        }
    }

    let store = live_store();
    let mut memories = MemoriesView::new(
        shared(&store),
        Arc::new(RefusingBlobs),
        Arc::new(ManualClock::new(1)),
    );
    memories.sync_scope(&session("u1", Some("u2")));
    assert!(matches!(
        memories.upload("a.png", b"png"),
        Err(ViewError::Mutation(_))
    ));
    assert!(memories.memories().is_empty());
}

#[test]
fn editor_is_last_write_wins_between_partners() {
    let store = live_store();
    let mut mine = EditorView::new(shared(&store), "// start");
    let mut theirs = EditorView::new(shared(&store), "// start");
    assert_eq!(mine.content(), "// start");

    mine.sync_scope(&session("u1", Some("u2")));
    theirs.sync_scope(&session("u2", Some("u1")));
    assert_eq!(mine.content(), "// start");

    mine.edit("fn main() {}").unwrap();
    assert_eq!(theirs.content(), "fn main() {}");

    theirs.edit("fn main() { loop {} }").unwrap();
    mine.edit("fn main() { println!() }").unwrap();
    assert_eq!(theirs.content(), "fn main() { println!() }");
    assert_eq!(mine.content(), "fn main() { println!() }");
}

#[test]
fn editor_without_scope_keeps_local_text() {
    let store = live_store();
    let mut editor = EditorView::new(shared(&store), "");
    editor.sync_scope(&session("u1", None));
    assert!(matches!(editor.edit("draft"), Err(ViewError::NoScope)));
    assert_eq!(editor.content(), "draft");
}

#[test]
fn feature_views_follow_session_and_dispose() {
    let dir = tempfile::tempdir().unwrap();
    let store = live_store();
    let mut views = FeatureViews::new(
        shared(&store),
        Arc::new(FsBlobStore::new(dir.path())),
        Arc::new(ManualClock::new(1)),
        "// hello",
    );

    views.sync_scope(&session("u1", Some("u2")));
    assert_eq!(store.listener_count(), 7);
    assert_eq!(views.chat.state(), ViewState::Subscribed);

    views.sync_scope(&session("u1", None));
    assert_eq!(store.listener_count(), 0);
    assert_eq!(views.editor.state(), ViewState::NoScope);

    views.sync_scope(&session("u1", Some("u2")));
    views.dispose();
    assert_eq!(store.listener_count(), 0);
    assert_eq!(views.tasks.state(), ViewState::Unsubscribed);
    assert_eq!(views.mood.state(), ViewState::Unsubscribed);
}
