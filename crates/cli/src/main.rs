mod config;
mod error;
mod panel;
mod status;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use config::Config;
use panel::ConsolePanel;
use runtime::{Agent, Bootstrap, BridgeTransport, Message, ProcessBridge};
use storage::{AppStorage, Role};

use error::{Error, Result};

const CONFIG_FILE: &str = "coxswain.toml";
const DB_FILE: &str = "chat.db";

#[derive(Parser)]
#[command(name = "coxswain")]
#[command(about = "A chat console bridged to a host application", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat,
    /// List all sessions
    Sessions {
        /// Show only the last N sessions
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Show the transcript for a session
    History {
        /// Session key
        #[arg(short, long, default_value = "main")]
        session: String,
    },
}

#[tokio::main]
async fn main() {
    status::init();

    if let Err(e) = run().await {
        status::report(&format!("error: {e}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Chat) | None => cmd_chat().await,
        Some(Commands::Sessions { limit }) => cmd_sessions(limit),
        Some(Commands::History { session }) => cmd_history(&session),
    }
}

/// Boot sequence: compose storage, wire the bridge transport into an agent,
/// and hand the agent to the panel.
async fn cmd_chat() -> Result<()> {
    println!("coxswain v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load_or_default(CONFIG_FILE);

    let data_dir = dirs_data_dir().unwrap_or_else(|| ".coxswain".into());
    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join(DB_FILE);

    storage::install_app_storage(AppStorage::open(&db_path)?)?;
    let storage = storage::app_storage()?;
    println!("Transcript stored at: {}", db_path.display());

    // Resume the session's transcript when one exists; the bootstrap
    // default is an empty history.
    let initial: Vec<Message> = storage
        .messages
        .load(&config.session_key)?
        .iter()
        .map(Message::from_record)
        .collect::<runtime::Result<_>>()?;
    if !initial.is_empty() {
        println!(
            "Resuming session '{}' ({} messages)",
            config.session_key,
            initial.len()
        );
    }

    storage.settings.set(
        "last_session_key",
        &serde_json::Value::String(config.session_key.clone()),
    )?;

    let bridge = ProcessBridge::new(&config.bridge.command).with_args(config.bridge.args.clone());
    let transport = BridgeTransport::new(bridge, config.session_key.clone());
    let bootstrap = Bootstrap {
        initial_messages: initial,
        session_key: config.session_key.clone(),
    };
    let agent = Agent::new(transport, config.run_config(), bootstrap, storage)?;

    println!("Session key: {}", config.session_key);
    println!("Host bridge: {}", config.bridge.command);
    println!("Type 'quit' or Ctrl+D to exit.\n");

    ConsolePanel::new().mount(agent).await
}

fn cmd_sessions(limit: usize) -> Result<()> {
    let storage = open_storage()?;
    let sessions = storage.sessions.list()?;

    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    let last_key = storage
        .settings
        .get("last_session_key")?
        .and_then(|v| v.as_str().map(str::to_string));

    println!("{:<20}  {:<16}  {:<8}  {:<20}", "KEY", "MODEL", "MSGS", "UPDATED");
    println!("{}", "-".repeat(72));

    for session in sessions.into_iter().take(limit) {
        let updated = local_time(&session.updated_at, "%Y-%m-%d %H:%M");
        let marker = if last_key.as_deref() == Some(session.key.as_str()) {
            " *"
        } else {
            ""
        };
        println!(
            "{:<20}  {:<16}  {:<8}  {updated}{marker}",
            session.key, session.model, session.message_count
        );
    }

    Ok(())
}

fn cmd_history(session_key: &str) -> Result<()> {
    let storage = open_storage()?;

    let records = storage.messages.load(session_key)?;
    if records.is_empty() {
        println!("No messages found for session '{session_key}'");
        return Ok(());
    }

    println!("Session: {session_key}\n");

    for record in &records {
        let message = Message::from_record(record)?;
        print_message(&record.created_at, &message);
    }

    let usage = storage.messages.usage_total(session_key)?;
    println!(
        "\ntokens: {} in / {} out (cost {:.4})",
        usage.input_tokens, usage.output_tokens, usage.cost_total
    );

    Ok(())
}

fn print_message(created_at: &str, message: &Message) {
    let time = local_time(created_at, "%H:%M:%S");
    let role = match message.role {
        Role::User => "USER",
        Role::Assistant => "ASSISTANT",
    };

    let content = message.text();
    // Truncate long messages for display, on a char boundary
    let display_content = if content.chars().count() > 200 {
        format!("{}...", content.chars().take(200).collect::<String>())
    } else {
        content
    };
    println!("[{time}] {role}: {display_content}");
}

fn local_time(rfc3339: &str, format: &str) -> String {
    DateTime::parse_from_rfc3339(rfc3339)
        .map(|t| t.with_timezone(&Local).format(format).to_string())
        .unwrap_or_else(|_| rfc3339.to_string())
}

fn open_storage() -> Result<Arc<AppStorage>> {
    let data_dir = dirs_data_dir().unwrap_or_else(|| ".coxswain".into());
    let db_path = data_dir.join(DB_FILE);

    if !db_path.exists() {
        return Err(Error::DatabaseNotFound { path: db_path });
    }

    storage::install_app_storage(AppStorage::open(&db_path)?)?;
    Ok(storage::app_storage()?)
}

fn dirs_data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share/coxswain"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share")))
            .map(|p| p.join("coxswain"))
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|h| PathBuf::from(h).join("coxswain"))
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        None
    }
}
