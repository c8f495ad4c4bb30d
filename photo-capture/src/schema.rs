use crate::models::PhotoRecord;
use crate::store::MediaStore;
use rusqlite::{params, Connection, OptionalExtension};

/// Key of the photo collection inside the shared store
pub const PHOTOS_KEY: &str = "media.photos";

/// Error type for shared store persistence
#[derive(Debug)]
pub enum SchemaError {
    DatabaseError(rusqlite::Error),
    SerializationError(serde_json::Error),
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaError::DatabaseError(e) => write!(f, "Database error: {}", e),
            SchemaError::SerializationError(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for SchemaError {}

impl From<rusqlite::Error> for SchemaError {
    fn from(err: rusqlite::Error) -> Self {
        SchemaError::DatabaseError(err)
    }
}

impl From<serde_json::Error> for SchemaError {
    fn from(err: serde_json::Error) -> Self {
        SchemaError::SerializationError(err)
    }
}

/// Initialize the shared store schema
pub fn init_store_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS store_schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT version FROM store_schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        create_store_schema_v1(conn)?;
        conn.execute("INSERT INTO store_schema_version (version) VALUES (1)", [])?;
    }

    Ok(())
}

/// Create shared store schema version 1
fn create_store_schema_v1(conn: &Connection) -> rusqlite::Result<()> {
    // Key/value table shared with the rest of the host application
    conn.execute(
        "CREATE TABLE IF NOT EXISTS shared_store (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    log::info!("Shared store schema v1 created");
    Ok(())
}

/// Loads the photo collection, an absent key yields an empty store
pub fn load_media_store(conn: &Connection) -> Result<MediaStore, SchemaError> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM shared_store WHERE key = ?1",
            params![PHOTOS_KEY],
            |row| row.get(0),
        )
        .optional()?;

    let records: Vec<PhotoRecord> = match value {
        Some(json) => serde_json::from_str(&json)?,
        None => Vec::new(),
    };

    log::debug!("Loaded {} photo records from shared store", records.len());
    Ok(MediaStore::from_records(records))
}

/// Writes the photo collection; an empty store is written as `[]`
pub fn save_media_store(conn: &Connection, store: &MediaStore) -> Result<(), SchemaError> {
    let json = serde_json::to_string(store.list())?;

    conn.execute(
        "INSERT INTO shared_store (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
        params![PHOTOS_KEY, json],
    )?;

    log::debug!("Saved {} photo records to shared store", store.len());
    Ok(())
}
