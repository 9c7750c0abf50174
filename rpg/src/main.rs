//! Console front end for the chat RPG.
//!
//! Runs the game against stdin/stdout, one line per chat message.
//!
//! # Environment
//!
//! - `RPG_CONFIG`: path to a JSON game config (built-in defaults otherwise)
//! - `RPG_DATA_DIR`: directory for the JSON store (in-memory otherwise)
//! - `RUST_LOG`: log filter, logs go to stderr
//!
//! ```bash
//! RPG_DATA_DIR=./data cargo run -p rpg -- --user 1
//! ```

mod console;

use anyhow::Context;
use rpg_core::regen::spawn_regeneration;
use rpg_core::{CharacterStore, GameConfig, GameService, ItemStore, JsonStore, MemoryStore};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rpg=info,rpg_core=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }
    let user = args
        .iter()
        .position(|a| a == "--user")
        .and_then(|i| args.get(i + 1))
        .cloned()
        .unwrap_or_else(|| "1".to_string());

    let config = match std::env::var("RPG_CONFIG") {
        Ok(path) => GameConfig::load(&path)
            .await
            .with_context(|| format!("failed to load config from {path}"))?,
        Err(_) => GameConfig::default(),
    };
    if config.admins.is_empty() {
        warn!("no admins configured, every user may create and hand out items");
    }

    let (characters, items): (Arc<dyn CharacterStore>, Arc<dyn ItemStore>) =
        match std::env::var("RPG_DATA_DIR") {
            Ok(dir) => {
                let store = Arc::new(
                    JsonStore::open(&dir)
                        .await
                        .with_context(|| format!("failed to open data directory {dir}"))?,
                );
                info!(%dir, "using JSON store");
                (store.clone() as Arc<dyn CharacterStore>, store as Arc<dyn ItemStore>)
            }
            Err(_) => {
                info!("RPG_DATA_DIR not set, nothing will be saved");
                let store = Arc::new(MemoryStore::new());
                (store.clone() as Arc<dyn CharacterStore>, store as Arc<dyn ItemStore>)
            }
        };

    let service = GameService::new(config, characters.clone(), items)
        .await
        .context("failed to start the game")?;
    let regen = spawn_regeneration(
        characters,
        service.config().regen_interval(),
        service.config().max_update_retries,
    );

    let result = console::run(service, &user).await;
    regen.abort();
    result
}

fn print_help() {
    println!("rpg - chat RPG in the terminal");
    println!();
    println!("USAGE:");
    println!("    rpg [--user <id>]");
    println!();
    println!("OPTIONS:");
    println!("    --user <id>    User to start as (default 1)");
    println!("    -h, --help     Print help information");
    println!();
    println!("ENVIRONMENT:");
    println!("    RPG_CONFIG     JSON game config");
    println!("    RPG_DATA_DIR   Directory for saved characters and items");
    println!("    RUST_LOG       Log filter (default rpg=info,rpg_core=info)");
}
