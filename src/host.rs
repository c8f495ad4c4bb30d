//! Line-oriented stand-in for the UI: turns commands into photo manager
//! requests, persists the store after every change and renders events.

use crate::database::save_photos;
use crate::error::AppError;
use photo_capture::{CaptureReport, PhotoEvent, PhotoManager, PhotoRecord};
use rusqlite::Connection;
use std::str::FromStr;

pub const HELP: &str = "commands: take [filename] | delete <id> | edit <id> | describe <id> <text> | list | clear | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Take(Option<String>),
    Delete(String),
    Edit(String),
    Describe { id: String, text: String },
    List,
    Clear,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = AppError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let required = |what: &str| {
            if rest.is_empty() {
                Err(AppError::Validation(format!("{} needs a photo id", what)))
            } else {
                Ok(rest.to_string())
            }
        };

        match verb.to_lowercase().as_str() {
            "take" => Ok(Command::Take((!rest.is_empty()).then(|| rest.to_string()))),
            "delete" => Ok(Command::Delete(required("delete")?)),
            "edit" => Ok(Command::Edit(required("edit")?)),
            "describe" => {
                let (id, text) = rest.split_once(char::is_whitespace).ok_or_else(|| {
                    AppError::Validation("describe needs a photo id and a text".to_string())
                })?;
                Ok(Command::Describe {
                    id: id.to_string(),
                    text: text.trim().to_string(),
                })
            }
            "list" => Ok(Command::List),
            "clear" => Ok(Command::Clear),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(AppError::Validation(format!("Unknown command: {}", other))),
        }
    }
}

fn persist(manager: &PhotoManager, conn: &Connection) -> Result<(), AppError> {
    manager.with_store(|store| save_photos(conn, store))
}

fn render_photo(photo: &PhotoRecord) -> String {
    let notes = if photo.description.is_empty() {
        "(no description)"
    } else {
        photo.description.as_str()
    };
    format!(
        "{}  {}  {}  {}",
        photo.id,
        photo.category,
        photo.date.format("%d %b %Y %H:%M"),
        notes
    )
}

/// Runs one command and returns the text to show
pub async fn execute(
    manager: &PhotoManager,
    conn: &Connection,
    command: Command,
) -> Result<String, AppError> {
    match command {
        Command::Take(filename) => match manager.take_photo(filename.as_deref()).await? {
            CaptureReport::Captured { id, .. } => {
                persist(manager, conn)?;
                Ok(format!(
                    "captured {} ({} left)",
                    id,
                    manager.remaining_captures()
                ))
            }
            CaptureReport::Rejected { max_photos } => Ok(format!(
                "no more photos allowed in this category (max {})",
                max_photos
            )),
        },
        Command::Delete(id) => {
            if manager.delete_photo(&id).await? {
                persist(manager, conn)?;
                Ok(format!("deleted {}", id))
            } else {
                Ok(format!("no photo with id {}", id))
            }
        }
        Command::Edit(id) => {
            if manager.edit_photo(&id) {
                Ok(format!("edit requested for {}", id))
            } else {
                Ok(format!("no photo with id {}", id))
            }
        }
        Command::Describe { id, text } => {
            if manager.update_description(&id, &text) {
                persist(manager, conn)?;
                Ok(format!("updated {}", id))
            } else {
                Ok(format!("no photo with id {}", id))
            }
        }
        Command::List => {
            let photos = manager.displayed_photos();
            if photos.is_empty() {
                return Ok("no photos".to_string());
            }
            Ok(photos
                .iter()
                .map(render_photo)
                .collect::<Vec<_>>()
                .join("\n"))
        }
        Command::Clear => {
            let result = manager.clear_photos().await;
            // Earlier deletions stick even if a later one failed
            persist(manager, conn)?;
            Ok(format!("removed {} photos", result?))
        }
        Command::Help | Command::Quit => Ok(HELP.to_string()),
    }
}

/// Renders a lifecycle event for the user
pub fn describe_event(event: &PhotoEvent) -> String {
    match event {
        PhotoEvent::CaptureComplete { id } => format!("[captureComplete] {}", id),
        PhotoEvent::MaxPhotosTaken { max_photos } => {
            format!("[maxPhotosTaken] maximum of {} photos reached", max_photos)
        }
        PhotoEvent::EditPhoto(request) => match serde_json::to_string(request) {
            Ok(json) => format!("[editPhoto] {}", json),
            Err(e) => format!("[editPhoto] {} ({})", request.id, e),
        },
        PhotoEvent::CollectionEmpty => "[empty] no photos left".to_string(),
        PhotoEvent::CaptureFailed { stage } => format!("[captureFailed] {}", stage),
        PhotoEvent::DeleteFailed { id, reason } => format!("[deleteFailed] {}: {}", id, reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::load_photos;
    use photo_capture::{
        init_store_schema, EventReceiver, LocalFileSystem, MediaStore, PhotoManagerConfig,
        SyntheticProvider,
    };
    use std::sync::Arc;

    fn setup(max_photos: u32) -> (PhotoManager, EventReceiver, Connection) {
        let conn = Connection::open_in_memory().unwrap();
        init_store_schema(&conn).unwrap();
        let config = PhotoManagerConfig {
            capture_category: "roof".to_string(),
            max_photos,
            ..Default::default()
        };
        let (manager, events) = PhotoManager::new(
            config,
            MediaStore::new(),
            Arc::new(SyntheticProvider),
            Arc::new(LocalFileSystem::new("./photos")),
        )
        .unwrap();
        (manager, events, conn)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!("take".parse::<Command>().unwrap(), Command::Take(None));
        assert_eq!(
            "take  meter.jpg ".parse::<Command>().unwrap(),
            Command::Take(Some("meter.jpg".to_string()))
        );
        assert_eq!(
            "DELETE job-1".parse::<Command>().unwrap(),
            Command::Delete("job-1".to_string())
        );
        assert_eq!(
            "describe job-1 north side, cracked".parse::<Command>().unwrap(),
            Command::Describe {
                id: "job-1".to_string(),
                text: "north side, cracked".to_string()
            }
        );
        assert_eq!("exit".parse::<Command>().unwrap(), Command::Quit);
    }

    #[test]
    fn test_parse_rejects_incomplete_commands() {
        assert!(matches!(
            "delete".parse::<Command>(),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            "describe job-1".parse::<Command>(),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            "fly".parse::<Command>(),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_take_persists_store() {
        let (manager, _events, conn) = setup(2);

        let out = execute(&manager, &conn, Command::Take(None)).await.unwrap();
        assert!(out.starts_with("captured job-"));
        assert!(out.ends_with("(1 left)"));
        assert_eq!(load_photos(&conn).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_capture_is_reported() {
        let (manager, mut events, conn) = setup(0);

        let out = execute(&manager, &conn, Command::Take(None)).await.unwrap();
        assert_eq!(out, "no more photos allowed in this category (max 0)");
        assert_eq!(
            describe_event(&events.try_recv().unwrap()),
            "[maxPhotosTaken] maximum of 0 photos reached"
        );
    }

    #[tokio::test]
    async fn test_delete_and_clear_persist_empty_collection() {
        let (manager, _events, conn) = setup(3);
        execute(&manager, &conn, Command::Take(None)).await.unwrap();
        execute(&manager, &conn, Command::Take(None)).await.unwrap();
        let id = manager.photos()[0].id.clone();

        let out = execute(&manager, &conn, Command::Delete(id.clone()))
            .await
            .unwrap();
        assert_eq!(out, format!("deleted {}", id));
        let out = execute(&manager, &conn, Command::Delete(id.clone()))
            .await
            .unwrap();
        assert_eq!(out, format!("no photo with id {}", id));

        let out = execute(&manager, &conn, Command::Clear).await.unwrap();
        assert_eq!(out, "removed 1 photos");
        let raw: String = conn
            .query_row(
                "SELECT value FROM shared_store WHERE key = ?1",
                [photo_capture::PHOTOS_KEY],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(raw, "[]");
    }

    #[tokio::test]
    async fn test_describe_and_list() {
        let (manager, mut events, conn) = setup(3);
        execute(&manager, &conn, Command::Take(None)).await.unwrap();
        let id = manager.photos()[0].id.clone();

        let out = execute(&manager, &conn, Command::List).await.unwrap();
        assert!(out.contains("(no description)"));

        execute(
            &manager,
            &conn,
            Command::Describe {
                id: id.clone(),
                text: "Gutter".to_string(),
            },
        )
        .await
        .unwrap();
        let out = execute(&manager, &conn, Command::List).await.unwrap();
        assert!(out.contains("Gutter"));
        assert!(load_photos(&conn).unwrap().get(&id).unwrap().modified);

        while events.try_recv().is_ok() {}
        execute(&manager, &conn, Command::Edit(id.clone()))
            .await
            .unwrap();
        let rendered = describe_event(&events.try_recv().unwrap());
        assert!(rendered.starts_with("[editPhoto] "));
        assert!(rendered.contains("photosContainer"));
    }
}
