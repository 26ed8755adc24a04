use crate::Database;
use crate::models::DocumentRow;
use anyhow::Result;
use board_types::models::{DocId, Document, Fields};
use rusqlite::Connection;
use tracing::warn;

impl Database {
    // -- Documents --

    pub fn insert_document(&self, collection: &str, doc: &Document) -> Result<()> {
        let fields = serde_json::to_string(&doc.fields)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents (id, collection, fields) VALUES (?1, ?2, ?3)",
                rusqlite::params![doc.id.to_string(), collection, fields],
            )?;
            Ok(())
        })
    }

    pub fn get_document_rows(&self, collection: &str) -> Result<Vec<DocumentRow>> {
        self.with_conn(|conn| query_documents(conn, collection))
    }

    /// Load a collection in insertion order. Rows that no longer decode are
    /// skipped with a warning.
    pub fn load_collection(&self, collection: &str) -> Result<Vec<Document>> {
        let rows = self.get_document_rows(collection)?;
        let docs = rows
            .into_iter()
            .filter_map(|row| {
                let id = match row.id.parse::<uuid::Uuid>() {
                    Ok(id) => DocId(id),
                    Err(e) => {
                        warn!(
                            "Corrupt document id '{}' in '{}' (stored {}): {}",
                            row.id, row.collection, row.stored_at, e
                        );
                        return None;
                    }
                };
                match serde_json::from_str::<Fields>(&row.fields) {
                    Ok(fields) => Some(Document { id, fields }),
                    Err(e) => {
                        warn!(
                            "Corrupt fields on document '{}' in '{}' (stored {}): {}",
                            row.id, row.collection, row.stored_at, e
                        );
                        None
                    }
                }
            })
            .collect();
        Ok(docs)
    }

    pub fn count_documents(&self, collection: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                [collection],
                |row| row.get(0),
            )?;
            Ok(n as usize)
        })
    }
}

fn query_documents(conn: &Connection, collection: &str) -> Result<Vec<DocumentRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, collection, fields, stored_at
         FROM documents
         WHERE collection = ?1
         ORDER BY seq ASC",
    )?;

    let rows = stmt
        .query_map([collection], |row| {
            Ok(DocumentRow {
                id: row.get(0)?,
                collection: row.get(1)?,
                fields: row.get(2)?,
                stored_at: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}
