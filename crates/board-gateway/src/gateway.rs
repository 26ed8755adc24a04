use std::future::Future;

use board_types::api::InitConfig;
use board_types::models::{
    CollectionSnapshot, DocId, Direction, Document, Fields, KeyRef, KeySnapshot,
};

use crate::stream::LiveStream;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("invalid init config: {0}")]
    Config(String),
}

/// Everything the board needs from the real-time store.
///
/// Two halves: document collections with ordered live queries, and a key
/// tree with live value subscriptions, a connection-state signal and
/// store-side cleanup when the connection drops. Handles are cheap to clone
/// and a clone shares the same connection.
pub trait StoreGateway: Clone + Send + Sync + 'static {
    /// Live query over a collection. The first item is the current result
    /// set; every later item is the whole result set again after a change.
    fn open_ordered_collection_query(
        &self,
        collection: &str,
        order_field: &str,
        direction: Direction,
    ) -> LiveStream<CollectionSnapshot>;

    /// Append a document. `FieldValue::ServerTimestamp` fields are resolved
    /// by the store at commit.
    fn append_document(
        &self,
        collection: &str,
        fields: Fields,
    ) -> impl Future<Output = Result<DocId, GatewayError>> + Send;

    /// Live value of a key-tree location (all of its children).
    fn open_key_value_subscription(&self, path: &str) -> LiveStream<KeySnapshot>;

    /// Emits the current connection state, then every transition.
    fn open_connection_state_signal(&self) -> LiveStream<bool>;

    /// Reserve a fresh child key under `path`. Nothing is written yet.
    fn push_new_child_key(&self, path: &str) -> KeyRef;

    /// Ask the store to delete `key` when this connection drops.
    fn register_auto_cleanup_on_disconnect(
        &self,
        key: &KeyRef,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    fn write_value(
        &self,
        key: &KeyRef,
        fields: Fields,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

/// Where the widget gets its connection configuration from.
pub trait ConfigSource: Send + Sync {
    fn fetch_init_config(&self) -> impl Future<Output = Result<InitConfig, GatewayError>> + Send;
}

/// Turns an init config into a live gateway.
pub trait GatewayConnector: Send + Sync {
    type Gateway: StoreGateway;

    fn connect(&self, config: &InitConfig) -> Result<Self::Gateway, GatewayError>;
}

/// Durable record of appended documents. Called off the async runtime,
/// before the document becomes visible to queries.
pub trait DocumentJournal: Send + Sync + 'static {
    fn record(&self, collection: &str, doc: &Document) -> Result<(), GatewayError>;
}
