use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use board_types::api::InitConfig;
use board_types::models::{
    CollectionSnapshot, DocId, Direction, Document, FieldValue, Fields, KeyRef, KeySnapshot,
};

use crate::gateway::{DocumentJournal, GatewayConnector, GatewayError, StoreGateway};
use crate::stream::{self, LiveStream, Publisher};

/// Source of server timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct StoreOptions {
    pub clock: Clock,
    pub journal: Option<Arc<dyn DocumentJournal>>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            clock: Arc::new(Utc::now),
            journal: None,
        }
    }
}

/// In-process real-time store shared by every session.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    state: Mutex<StoreState>,
    clock: Clock,
    journal: Option<Arc<dyn DocumentJournal>>,
}

#[derive(Default)]
struct StoreState {
    /// collection -> documents in commit order
    collections: HashMap<String, Vec<Document>>,
    read_only: HashSet<String>,
    queries: Vec<QueryWatch>,

    /// path -> (child key -> fields)
    tree: HashMap<String, BTreeMap<String, Fields>>,
    key_watches: Vec<KeyWatch>,

    sessions: HashMap<u64, SessionState>,
    next_session: u64,
}

struct QueryWatch {
    collection: String,
    order_field: String,
    direction: Direction,
    tx: Publisher<CollectionSnapshot>,
}

struct KeyWatch {
    path: String,
    tx: Publisher<KeySnapshot>,
}

struct SessionState {
    connected: bool,
    signals: Vec<Publisher<bool>>,
    cleanup: Vec<KeyRef>,
}

impl StoreState {
    fn snapshot(&self, collection: &str, order_field: &str, direction: Direction) -> CollectionSnapshot {
        let mut documents = self.collections.get(collection).cloned().unwrap_or_default();
        documents.sort_by(|a, b| {
            let ord = FieldValue::order_cmp(a.get(order_field), b.get(order_field))
                .then_with(|| a.id.cmp(&b.id));
            match direction {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            }
        });
        CollectionSnapshot { documents }
    }

    fn key_snapshot(&self, path: &str) -> KeySnapshot {
        KeySnapshot {
            path: path.to_string(),
            children: self.tree.get(path).cloned().unwrap_or_default(),
        }
    }

    fn notify_collection(&mut self, collection: &str) {
        let mut queries = std::mem::take(&mut self.queries);
        queries.retain(|q| {
            if q.collection != collection {
                return !q.tx.is_closed();
            }
            q.tx.publish(self.snapshot(&q.collection, &q.order_field, q.direction))
        });
        self.queries = queries;
    }

    fn notify_path(&mut self, path: &str) {
        let mut watches = std::mem::take(&mut self.key_watches);
        watches.retain(|w| {
            if w.path != path {
                return !w.tx.is_closed();
            }
            w.tx.publish(self.key_snapshot(path))
        });
        self.key_watches = watches;
    }

    fn is_connected(&self, session: u64) -> bool {
        self.sessions.get(&session).is_some_and(|s| s.connected)
    }

    /// Marks the session offline and runs its cleanup list.
    fn disconnect(&mut self, session: u64) -> bool {
        let Some(s) = self.sessions.get_mut(&session) else {
            return false;
        };
        if !s.connected {
            return false;
        }
        s.connected = false;
        let cleanup = std::mem::take(&mut s.cleanup);
        s.signals.retain(|tx| tx.publish(false));

        let mut touched = Vec::new();
        for key in cleanup {
            if let Some(children) = self.tree.get_mut(&key.path) {
                if children.remove(&key.key).is_some() && !touched.contains(&key.path) {
                    touched.push(key.path);
                }
            }
        }
        for path in touched {
            self.notify_path(&path);
        }
        true
    }
}

fn resolve(fields: Fields, now: DateTime<Utc>) -> Fields {
    fields
        .into_iter()
        .map(|(name, value)| match value {
            FieldValue::ServerTimestamp => (name, FieldValue::Timestamp(now)),
            other => (name, other),
        })
        .collect()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_options(StoreOptions::default())
    }

    pub fn with_options(options: StoreOptions) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(StoreState::default()),
                clock: options.clock,
                journal: options.journal,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // State is only mutated in short, panic-free sections; a poisoned
        // lock still holds consistent data.
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open a new client session. It starts connected.
    pub fn open_session(&self) -> MemoryGateway {
        let id = {
            let mut state = self.lock();
            let id = state.next_session;
            state.next_session += 1;
            state.sessions.insert(
                id,
                SessionState {
                    connected: true,
                    signals: Vec::new(),
                    cleanup: Vec::new(),
                },
            );
            id
        };
        debug!("Session {} opened", id);
        MemoryGateway {
            store: self.clone(),
            session: Arc::new(Session {
                id,
                store: self.clone(),
            }),
        }
    }

    /// Load previously journaled documents. Watchers see one new snapshot.
    pub fn restore(&self, collection: &str, docs: Vec<Document>) {
        let count = docs.len();
        let mut state = self.lock();
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .extend(docs);
        state.notify_collection(collection);
        info!("Restored {} documents into '{}'", count, collection);
    }

    /// Reject further appends to `collection` with `PermissionDenied`.
    pub fn set_read_only(&self, collection: &str, read_only: bool) {
        let mut state = self.lock();
        if read_only {
            state.read_only.insert(collection.to_string());
        } else {
            state.read_only.remove(collection);
        }
    }

    /// One-shot read of an ordered collection.
    pub fn snapshot(&self, collection: &str, order_field: &str, direction: Direction) -> CollectionSnapshot {
        self.lock().snapshot(collection, order_field, direction)
    }

    pub fn child_count(&self, path: &str) -> usize {
        self.lock().tree.get(path).map_or(0, BTreeMap::len)
    }

    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Live collection queries that still have a listener. Closed ones are
    /// pruned here as well as on the next publish.
    pub fn open_query_count(&self) -> usize {
        let mut state = self.lock();
        state.queries.retain(|q| !q.tx.is_closed());
        state.queries.len()
    }

    fn end_session(&self, id: u64) {
        let mut state = self.lock();
        state.disconnect(id);
        state.sessions.remove(&id);
        debug!("Session {} ended", id);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayConnector for MemoryStore {
    type Gateway = MemoryGateway;

    fn connect(&self, config: &InitConfig) -> Result<MemoryGateway, GatewayError> {
        debug!("Connecting session for project '{}'", config.project_id);
        Ok(self.open_session())
    }
}

/// Ends the session once the last gateway handle is dropped.
struct Session {
    id: u64,
    store: MemoryStore,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.store.end_session(self.id);
    }
}

/// One client connection to a [`MemoryStore`].
#[derive(Clone)]
pub struct MemoryGateway {
    store: MemoryStore,
    session: Arc<Session>,
}

impl MemoryGateway {
    pub fn session_id(&self) -> u64 {
        self.session.id
    }

    pub fn is_connected(&self) -> bool {
        self.store.lock().is_connected(self.session.id)
    }

    /// Drop the connection: registered cleanups run and the connection
    /// signal emits `false`.
    pub fn disconnect(&self) {
        if self.store.lock().disconnect(self.session.id) {
            info!("Session {} disconnected", self.session.id);
        }
    }

    pub fn reconnect(&self) {
        let mut state = self.store.lock();
        if let Some(s) = state.sessions.get_mut(&self.session.id) {
            if !s.connected {
                s.connected = true;
                s.signals.retain(|tx| tx.publish(true));
                info!("Session {} reconnected", self.session.id);
            }
        }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    fn check_write(&self, state: &StoreState, what: &str) -> Result<(), GatewayError> {
        if state.is_connected(self.session.id) {
            Ok(())
        } else {
            Err(GatewayError::Unavailable(format!("session offline while writing {}", what)))
        }
    }
}

impl StoreGateway for MemoryGateway {
    fn open_ordered_collection_query(
        &self,
        collection: &str,
        order_field: &str,
        direction: Direction,
    ) -> LiveStream<CollectionSnapshot> {
        let (tx, rx) = stream::channel();
        let mut state = self.store.lock();
        tx.publish(state.snapshot(collection, order_field, direction));
        state.queries.push(QueryWatch {
            collection: collection.to_string(),
            order_field: order_field.to_string(),
            direction,
            tx,
        });
        rx
    }

    async fn append_document(&self, collection: &str, fields: Fields) -> Result<DocId, GatewayError> {
        {
            let state = self.store.lock();
            if state.read_only.contains(collection) {
                return Err(GatewayError::PermissionDenied(format!(
                    "collection '{}' is read-only",
                    collection
                )));
            }
            self.check_write(&state, collection)?;
        }

        let doc = Document {
            id: DocId::new(),
            fields: resolve(fields, (self.store.inner.clock)()),
        };

        if let Some(journal) = self.store.inner.journal.clone() {
            let name = collection.to_string();
            let record = doc.clone();
            tokio::task::spawn_blocking(move || journal.record(&name, &record))
                .await
                .map_err(|e| GatewayError::Storage(format!("journal task failed: {}", e)))??;
        }

        let id = doc.id;
        let mut state = self.store.lock();
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(doc);
        state.notify_collection(collection);
        debug!("Appended {} to '{}'", id, collection);
        Ok(id)
    }

    fn open_key_value_subscription(&self, path: &str) -> LiveStream<KeySnapshot> {
        let (tx, rx) = stream::channel();
        let mut state = self.store.lock();
        tx.publish(state.key_snapshot(path));
        state.key_watches.push(KeyWatch {
            path: path.to_string(),
            tx,
        });
        rx
    }

    fn open_connection_state_signal(&self) -> LiveStream<bool> {
        let (tx, rx) = stream::channel();
        let mut state = self.store.lock();
        match state.sessions.get_mut(&self.session.id) {
            Some(s) => {
                tx.publish(s.connected);
                s.signals.push(tx);
            }
            None => warn!("Connection signal requested on ended session {}", self.session.id),
        }
        rx
    }

    fn push_new_child_key(&self, path: &str) -> KeyRef {
        KeyRef {
            path: path.to_string(),
            key: Uuid::now_v7().simple().to_string(),
        }
    }

    async fn register_auto_cleanup_on_disconnect(&self, key: &KeyRef) -> Result<(), GatewayError> {
        let mut state = self.store.lock();
        self.check_write(&state, &key.to_string())?;
        if let Some(s) = state.sessions.get_mut(&self.session.id) {
            s.cleanup.push(key.clone());
        }
        Ok(())
    }

    async fn write_value(&self, key: &KeyRef, fields: Fields) -> Result<(), GatewayError> {
        let now = (self.store.inner.clock)();
        let mut state = self.store.lock();
        self.check_write(&state, &key.to_string())?;
        state
            .tree
            .entry(key.path.clone())
            .or_default()
            .insert(key.key.clone(), resolve(fields, now));
        state.notify_path(&key.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    use board_types::models::{Comment, NewComment, PresenceMarker, comment_fields, presence_fields};
    use chrono::TimeZone;

    fn stepping_clock() -> Clock {
        let tick = Arc::new(AtomicI64::new(0));
        Arc::new(move || {
            let n = tick.fetch_add(1, Ordering::SeqCst);
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap() + chrono::Duration::minutes(n)
        })
    }

    fn store() -> MemoryStore {
        MemoryStore::with_options(StoreOptions {
            clock: stepping_clock(),
            journal: None,
        })
    }

    fn comment(author: &str, body: &str) -> Fields {
        NewComment {
            author: author.into(),
            body: body.into(),
        }
        .into_fields()
    }

    #[tokio::test]
    async fn query_delivers_initial_and_full_snapshots() {
        let store = store();
        let gw = store.open_session();
        let mut feed =
            gw.open_ordered_collection_query("comments", comment_fields::CREATED_AT, Direction::Descending);
        assert!(feed.recv().await.unwrap().is_empty());

        gw.append_document("comments", comment("ana", "first")).await.unwrap();
        gw.append_document("comments", comment("luis", "second")).await.unwrap();

        assert_eq!(feed.recv().await.unwrap().len(), 1);
        let snap = feed.recv().await.unwrap();
        let bodies: Vec<_> = snap
            .documents
            .iter()
            .map(|d| Comment::from_document(d).body)
            .collect();
        assert_eq!(bodies, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn server_timestamp_is_resolved_on_commit() {
        let store = store();
        let gw = store.open_session();
        gw.append_document("comments", comment("ana", "hi")).await.unwrap();

        let snap = store.snapshot("comments", comment_fields::CREATED_AT, Direction::Ascending);
        let created = Comment::from_document(&snap.documents[0]).created_at;
        assert_eq!(created, Some(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()));
    }

    #[tokio::test]
    async fn documents_without_order_field_sort_last_descending() {
        let store = store();
        let untimed = Document {
            id: DocId::new(),
            fields: Fields::from([(comment_fields::BODY.to_string(), FieldValue::from("old"))]),
        };
        store.restore("comments", vec![untimed]);
        store
            .open_session()
            .append_document("comments", comment("ana", "new"))
            .await
            .unwrap();

        let snap = store.snapshot("comments", comment_fields::CREATED_AT, Direction::Descending);
        let bodies: Vec<_> = snap.documents.iter().map(|d| Comment::from_document(d).body).collect();
        assert_eq!(bodies, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn read_only_collection_rejects_append() {
        let store = store();
        let gw = store.open_session();
        store.set_read_only("comments", true);
        let err = gw.append_document("comments", comment("a", "b")).await.unwrap_err();
        assert!(matches!(err, GatewayError::PermissionDenied(_)));
        assert!(store.snapshot("comments", comment_fields::CREATED_AT, Direction::Descending).is_empty());
    }

    #[tokio::test]
    async fn offline_session_cannot_write() {
        let store = store();
        let gw = store.open_session();
        gw.disconnect();
        let err = gw.append_document("comments", comment("a", "b")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unavailable(_)));
        let key = gw.push_new_child_key("presence");
        assert!(gw.write_value(&key, PresenceMarker::new("x").into_fields()).await.is_err());
    }

    #[tokio::test]
    async fn disconnect_removes_registered_keys() {
        let store = store();
        let watcher = store.open_session();
        let mut viewers = watcher.open_key_value_subscription("presence");
        assert_eq!(viewers.recv().await.unwrap().child_count(), 0);

        let gw = store.open_session();
        let key = gw.push_new_child_key("presence");
        gw.register_auto_cleanup_on_disconnect(&key).await.unwrap();
        gw.write_value(&key, PresenceMarker::new("test-agent").into_fields())
            .await
            .unwrap();

        let snap = viewers.recv().await.unwrap();
        assert_eq!(snap.child_count(), 1);
        let marker = &snap.children[&key.key];
        assert_eq!(marker.get(presence_fields::CLIENT), Some(&FieldValue::from("test-agent")));
        assert!(matches!(marker.get(presence_fields::CONNECTED_AT), Some(FieldValue::Timestamp(_))));

        gw.disconnect();
        assert_eq!(viewers.recv().await.unwrap().child_count(), 0);
        assert_eq!(store.child_count("presence"), 0);
    }

    #[tokio::test]
    async fn connection_signal_reports_transitions() {
        let store = store();
        let gw = store.open_session();
        let mut signal = gw.open_connection_state_signal();
        assert_eq!(signal.recv().await, Some(true));

        gw.disconnect();
        gw.disconnect();
        gw.reconnect();
        assert_eq!(signal.recv().await, Some(false));
        assert_eq!(signal.recv().await, Some(true));
        assert!(signal.try_recv().is_none());
    }

    #[tokio::test]
    async fn dropping_last_handle_ends_session() {
        let store = store();
        let gw = store.open_session();
        let key = gw.push_new_child_key("presence");
        gw.register_auto_cleanup_on_disconnect(&key).await.unwrap();
        gw.write_value(&key, PresenceMarker::new("x").into_fields()).await.unwrap();

        let clone = gw.clone();
        drop(gw);
        assert_eq!(store.session_count(), 1);
        assert_eq!(store.child_count("presence"), 1);

        drop(clone);
        assert_eq!(store.session_count(), 0);
        assert_eq!(store.child_count("presence"), 0);
    }

    #[tokio::test]
    async fn closed_queries_are_pruned() {
        let store = store();
        let gw = store.open_session();
        let feed = gw.open_ordered_collection_query("comments", comment_fields::CREATED_AT, Direction::Descending);
        feed.unsubscribe();
        gw.append_document("comments", comment("a", "b")).await.unwrap();
        assert!(store.lock().queries.is_empty());
    }

    struct FailingJournal;

    impl DocumentJournal for FailingJournal {
        fn record(&self, _collection: &str, _doc: &Document) -> Result<(), GatewayError> {
            Err(GatewayError::Storage("disk full".into()))
        }
    }

    #[tokio::test]
    async fn journal_failure_keeps_document_invisible() {
        let store = MemoryStore::with_options(StoreOptions {
            clock: stepping_clock(),
            journal: Some(Arc::new(FailingJournal)),
        });
        let gw = store.open_session();
        let err = gw.append_document("comments", comment("a", "b")).await.unwrap_err();
        assert_eq!(err, GatewayError::Storage("disk full".into()));
        assert!(store.snapshot("comments", comment_fields::CREATED_AT, Direction::Descending).is_empty());
    }
}
