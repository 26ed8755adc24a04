use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Field names of a comment document.
pub mod comment_fields {
    pub const AUTHOR: &str = "author";
    pub const BODY: &str = "body";
    pub const CREATED_AT: &str = "created_at";
}

/// Field names of a presence marker.
pub mod presence_fields {
    pub const CONNECTED_AT: &str = "connected_at";
    pub const CLIENT: &str = "client";
}

/// A single value stored in a document or under a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
    /// Write-only sentinel. The store replaces it with its own clock reading
    /// when the write commits, so it never appears in a snapshot.
    ServerTimestamp,
}

impl FieldValue {
    fn rank(&self) -> u8 {
        match self {
            Self::Null | Self::ServerTimestamp => 0,
            Self::Bool(_) => 1,
            Self::Integer(_) => 2,
            Self::Timestamp(_) => 3,
            Self::Text(_) => 4,
        }
    }

    /// Total order used by ordered queries. A missing field sorts as `Null`.
    pub fn order_cmp(a: Option<&FieldValue>, b: Option<&FieldValue>) -> Ordering {
        let a = a.unwrap_or(&FieldValue::Null);
        let b = b.unwrap_or(&FieldValue::Null);
        match (a, b) {
            (Self::Bool(x), Self::Bool(y)) => x.cmp(y),
            (Self::Integer(x), Self::Integer(y)) => x.cmp(y),
            (Self::Text(x), Self::Text(y)) => x.cmp(y),
            (Self::Timestamp(x), Self::Timestamp(y)) => x.cmp(y),
            _ => a.rank().cmp(&b.rank()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

pub type Fields = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(pub Uuid);

impl DocId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A committed document in a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub fields: Fields,
}

impl Document {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Ascending,
    Descending,
}

/// Full ordered result set of a live collection query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionSnapshot {
    pub documents: Vec<Document>,
}

impl CollectionSnapshot {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Reference to a child entry in the key tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyRef {
    pub path: String,
    pub key: String,
}

impl std::fmt::Display for KeyRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.path, self.key)
    }
}

/// Value of one key-tree location: its children, keyed by child key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySnapshot {
    pub path: String,
    pub children: BTreeMap<String, Fields>,
}

impl KeySnapshot {
    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

/// A comment as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: DocId,
    pub author: String,
    pub body: String,
    /// Absent until the store has committed the write.
    pub created_at: Option<DateTime<Utc>>,
}

impl Comment {
    /// Missing or mistyped fields read as empty text / no timestamp.
    pub fn from_document(doc: &Document) -> Self {
        let text = |field: &str| {
            doc.get(field)
                .and_then(FieldValue::as_text)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            id: doc.id,
            author: text(comment_fields::AUTHOR),
            body: text(comment_fields::BODY),
            created_at: doc
                .get(comment_fields::CREATED_AT)
                .and_then(FieldValue::as_timestamp),
        }
    }
}

/// A comment about to be appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub author: String,
    pub body: String,
}

impl NewComment {
    pub fn into_fields(self) -> Fields {
        Fields::from([
            (comment_fields::AUTHOR.to_string(), FieldValue::Text(self.author)),
            (comment_fields::BODY.to_string(), FieldValue::Text(self.body)),
            (comment_fields::CREATED_AT.to_string(), FieldValue::ServerTimestamp),
        ])
    }
}

/// Ephemeral record for one live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceMarker {
    pub client: String,
}

impl PresenceMarker {
    pub fn new(client: impl Into<String>) -> Self {
        Self {
            client: client.into(),
        }
    }

    pub fn into_fields(self) -> Fields {
        Fields::from([
            (presence_fields::CONNECTED_AT.to_string(), FieldValue::ServerTimestamp),
            (presence_fields::CLIENT.to_string(), FieldValue::Text(self.client)),
        ])
    }
}
