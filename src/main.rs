mod camera;
mod config;
mod database;
mod error;
mod filesystem;
mod host;

use error::AppError;
use host::Command;
use photo_capture::{EventReceiver, LocalFileSystem, PhotoManager};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

fn init_logging() {
    #[cfg(target_os = "android")]
    android_logger::init_once(
        android_logger::Config::default().with_max_level(log::LevelFilter::Debug),
    );

    #[cfg(not(target_os = "android"))]
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

fn print_events(events: &mut EventReceiver) {
    while let Ok(event) = events.try_recv() {
        println!("{}", host::describe_event(&event));
    }
}

async fn run() -> Result<(), AppError> {
    let data_dir = filesystem::get_app_data_dir();
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir.join(config::CONFIG_FILE));

    let app_config = config::load_from_path(&config_path)?;
    let conn = database::init_database(&app_config.database_path(&data_dir))?;
    let store = database::load_photos(&conn)?;

    let storage = Arc::new(LocalFileSystem::new(app_config.storage_path(&data_dir)));
    log::info!("Photos stored in {}", storage.root().display());
    let provider = camera::select_provider(&app_config, storage.clone());

    let (manager, mut events) =
        PhotoManager::new(app_config.photos.clone(), store, provider, storage)?;

    println!("{}", host::HELP);
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(Command::Quit) => break,
            Ok(command) => command,
            Err(e) => {
                println!("{}", e.user_message());
                continue;
            }
        };

        match host::execute(&manager, &conn, command).await {
            Ok(output) => println!("{}", output),
            Err(e) => {
                log::warn!("{}", e);
                println!("{}", e.user_message());
            }
        }
        print_events(&mut events);
    }

    log::info!("Photo manager stopped");
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging();

    if let Err(e) = run().await {
        log::error!("{}", e);
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }
}
