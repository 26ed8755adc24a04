/// One journal row as stored in SQLite.
/// `fields` is the JSON encoding of `board_types::models::Fields`.
pub struct DocumentRow {
    pub id: String,
    pub collection: String,
    pub fields: String,
    pub stored_at: String,
}
