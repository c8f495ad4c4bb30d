use crate::error::AppError;
use photo_capture::{init_store_schema, load_media_store, save_media_store, MediaStore};
use rusqlite::Connection;
use std::path::Path;

/// Opens the shared store database and makes sure its schema exists
pub fn init_database(db_path: &Path) -> Result<Connection, AppError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(db_path)?;
    init_store_schema(&conn)?;

    log::info!("Database ready at {}", db_path.display());
    Ok(conn)
}

pub fn load_photos(conn: &Connection) -> Result<MediaStore, AppError> {
    Ok(load_media_store(conn)?)
}

pub fn save_photos(conn: &Connection, store: &MediaStore) -> Result<(), AppError> {
    Ok(save_media_store(conn, store)?)
}
