use std::sync::Arc;

use board_db::Database;
use board_gateway::{DocumentJournal, GatewayError};
use board_types::models::Document;

/// Writes every appended document to SQLite before it becomes visible.
pub struct DbJournal {
    db: Arc<Database>,
}

impl DbJournal {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl DocumentJournal for DbJournal {
    fn record(&self, collection: &str, doc: &Document) -> Result<(), GatewayError> {
        self.db
            .insert_document(collection, doc)
            .map_err(|e| GatewayError::Storage(e.to_string()))
    }
}
