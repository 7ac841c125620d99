//! quickcap - quick-capture server and terminal companion

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};

use quickcap::api;
use quickcap::config::{self, Config, TokenConfig};
use quickcap::confirm::{Click, DeleteConfirm};
use quickcap::db::Database;
use quickcap::focus::{FocusOutcome, FocusRunner};
use quickcap::models::{RecordUpdate, random_id};
use quickcap::notes::{AUTOSAVE_DELAY, NotesEditor};

#[derive(Parser)]
#[command(name = "quickcap")]
#[command(about = "Quick-capture tasks, notes and pomodoro focus sessions")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address (overrides config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Generate, list or revoke API tokens
    Token {
        /// Name/label for the token
        #[arg(short, long)]
        name: Option<String>,

        /// Bind the token to an existing user instead of a new one
        #[arg(long)]
        user_id: Option<i64>,

        /// Grant access to the admin endpoints
        #[arg(long)]
        admin: bool,

        /// List all configured tokens
        #[arg(long)]
        list: bool,

        /// Revoke a token by name
        #[arg(long)]
        revoke: Option<String>,
    },

    /// Initialize a new config file
    Init {
        /// Output path for config file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a pomodoro countdown for a task in the terminal
    Focus {
        /// Pomodoro task id (defaults to the saved session)
        task_id: Option<i64>,

        /// Token name whose user owns the task (defaults to the first token)
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Edit a record's progress notes from stdin
    Notes {
        /// Record id
        record_id: i64,

        /// Token name whose user owns the record (defaults to the first token)
        #[arg(short, long)]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("quickcap=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };

    match cli.command {
        Commands::Serve { port, bind } => {
            let mut cfg = load_config(&config_path)?;
            if let Some(p) = port {
                cfg.server.port = p;
            }
            if let Some(b) = bind {
                cfg.server.bind = b;
            }
            run_server(cfg).await
        }

        Commands::Token {
            name,
            user_id,
            admin,
            list,
            revoke,
        } => {
            if list {
                return list_tokens(&config_path);
            }
            if let Some(token_name) = revoke {
                return revoke_token(&config_path, &token_name);
            }
            create_token(&config_path, name, user_id, admin)
        }

        Commands::Init { output } => {
            let path = output.unwrap_or_else(|| PathBuf::from("config.toml"));
            Config::default().save_to(&path)?;

            println!("Created config file: {}", path.display());
            println!();
            println!("Next steps:");
            println!(
                "  1. Generate a token: quickcap --config {} token --name my-device",
                path.display()
            );
            println!(
                "  2. Start the server: quickcap --config {} serve",
                path.display()
            );

            Ok(())
        }

        Commands::Focus { task_id, user } => {
            let cfg = load_config(&config_path)?;
            let user_id = resolve_user(&cfg, user.as_deref())?;
            let db = Database::open(&cfg.database.path).context("Failed to open database")?;

            let runner = FocusRunner::begin(
                &db,
                user_id,
                task_id,
                cfg.pomodoro.focus_minutes,
                cfg.focus_state_path()?,
            )?;
            match runner.run().await? {
                FocusOutcome::Completed(task) => println!(
                    "Pomodoro done: {}/{} for \"{}\" ({})",
                    task.pomodoros_completed,
                    task.estimated_pomodoros,
                    task.title,
                    task.status
                ),
                FocusOutcome::Paused { minutes, seconds } => {
                    println!("Paused with {minutes:02}:{seconds:02} left. Run again to resume.")
                }
            }
            Ok(())
        }

        Commands::Notes { record_id, user } => {
            let cfg = load_config(&config_path)?;
            let user_id = resolve_user(&cfg, user.as_deref())?;
            let db = Database::open(&cfg.database.path).context("Failed to open database")?;
            edit_notes(&db, user_id, record_id).await
        }
    }
}

fn load_config(path: &std::path::Path) -> Result<Config> {
    if path.exists() {
        Config::load_from(path)
    } else {
        Ok(Config::default())
    }
}

fn resolve_user(cfg: &Config, name: Option<&str>) -> Result<i64> {
    cfg.token_named(name)
        .map(|t| t.user_id)
        .with_context(|| match name {
            Some(name) => format!("No token named '{name}' in config"),
            None => "No tokens configured. Run 'quickcap token' first.".to_string(),
        })
}

async fn run_server(config: Config) -> Result<()> {
    let db = Database::open(&config.database.path).context("Failed to open database")?;

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let state = api::AppState::new(db, config);
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!("quickcap server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn list_tokens(config_path: &std::path::Path) -> Result<()> {
    if !config_path.exists() {
        println!("No config file found at {}", config_path.display());
        println!("Run 'quickcap init' to create one.");
        return Ok(());
    }

    let cfg = Config::load_from(config_path)?;
    if cfg.tokens.is_empty() {
        println!("No tokens configured.");
        println!("Generate one with: quickcap token --name <device-name>");
        return Ok(());
    }

    println!("Configured tokens:");
    println!();
    for token in &cfg.tokens {
        let hash_preview: String = token.token_hash.chars().take(20).collect();
        println!(
            "  {} - user {}{} - {}...",
            token.name,
            token.user_id,
            if token.admin { " (admin)" } else { "" },
            hash_preview
        );
    }
    Ok(())
}

fn revoke_token(config_path: &std::path::Path, token_name: &str) -> Result<()> {
    if !config_path.exists() {
        println!("No config file found at {}", config_path.display());
        return Ok(());
    }

    let mut cfg = Config::load_from(config_path)?;
    let original_len = cfg.tokens.len();
    cfg.tokens.retain(|t| t.name != token_name);

    if cfg.tokens.len() == original_len {
        println!("Token '{}' not found.", token_name);
    } else {
        cfg.save_to(config_path)?;
        tracing::info!(token = token_name, "Token revoked");
        println!("Revoked token '{}'.", token_name);
    }
    Ok(())
}

fn create_token(
    config_path: &std::path::Path,
    name: Option<String>,
    user_id: Option<i64>,
    admin: bool,
) -> Result<()> {
    let token = generate_token();
    let label = name.unwrap_or_else(|| "default".to_string());
    let entry = TokenConfig {
        name: label.clone(),
        token_hash: config::hash_token(&token)?,
        user_id: user_id.unwrap_or_else(random_id),
        admin,
    };

    if config_path.exists() {
        let mut cfg = Config::load_from(config_path)?;
        if cfg.tokens.iter().any(|t| t.name == label) {
            println!(
                "Token '{}' already exists. Use --revoke first to replace it.",
                label
            );
            return Ok(());
        }

        let user = entry.user_id;
        cfg.tokens.push(entry);
        cfg.save_to(config_path)?;

        println!("Generated API token for '{}' (user {})\n", label, user);
        println!("Token: {}\n", token);
        println!("Send it as: Authorization: Bearer {}", token);
    } else {
        println!("Generated API token for '{}':\n", label);
        println!("Token: {}\n", token);
        println!("Add this to your server's config.toml:\n");
        println!("  [[tokens]]");
        println!("  name = \"{}\"", entry.name);
        println!("  token_hash = \"{}\"", entry.token_hash);
        println!("  user_id = {}", entry.user_id);
        println!("  admin = {}\n", entry.admin);
    }
    println!("Save this token now - it cannot be retrieved later!");

    Ok(())
}

/// 40 random alphanumeric characters behind a `qc_` prefix
fn generate_token() -> String {
    use rand::{Rng, distr::Alphanumeric};
    let body: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(40)
        .map(char::from)
        .collect();
    format!("qc_{body}")
}

/// Line-oriented notes editor. Each input line replaces the notes; `:undo`,
/// `:w` and `:delete` are commands. Autosaves after a quiet period and on EOF.
async fn edit_notes(db: &Database, user_id: i64, record_id: i64) -> Result<()> {
    let record = db.get_record(user_id, record_id, false)?;
    let mut editor = NotesEditor::new(record.progress_notes.unwrap_or_default());
    let mut confirm = DeleteConfirm::default();

    println!("Editing notes for \"{}\"", record.content);
    println!("Current: {}", editor.text());
    println!("Type new notes, :undo, :w to save, :delete twice to delete the record.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let deadline = editor.deadline();
        let due = deadline.unwrap_or_else(|| Instant::now() + AUTOSAVE_DELAY);

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    let pending = editor.flush();
                    save_notes(db, user_id, record_id, &mut editor, pending)?;
                    return Ok(());
                };
                let now = Instant::now();
                match line.trim() {
                    ":delete" => match confirm.click(record_id, now) {
                        Click::Armed => println!("Type :delete again within 3s to delete"),
                        Click::Confirmed => {
                            db.delete_record(user_id, record_id)?;
                            println!("Record deleted");
                            return Ok(());
                        }
                    },
                    ":undo" => {
                        confirm.cancel();
                        if !editor.undo(now) {
                            println!("Nothing to undo");
                        }
                    }
                    ":w" => {
                        confirm.cancel();
                        let pending = editor.flush();
                        save_notes(db, user_id, record_id, &mut editor, pending)?;
                    }
                    _ => {
                        confirm.cancel();
                        editor.edit(line, now);
                    }
                }
            }
            _ = tokio::time::sleep_until(due.into()), if deadline.is_some() => {
                let pending = editor.poll(Instant::now());
                save_notes(db, user_id, record_id, &mut editor, pending)?;
            }
        }
    }
}

fn save_notes(
    db: &Database,
    user_id: i64,
    record_id: i64,
    editor: &mut NotesEditor,
    pending: Option<String>,
) -> Result<()> {
    let Some(text) = pending else {
        return Ok(());
    };
    let changes = RecordUpdate {
        progress_notes: Some(text.clone()),
        ..Default::default()
    }
    .validate()?;
    db.update_record(user_id, record_id, &changes)?;
    editor.mark_saved(&text);
    tracing::info!(record_id, "Progress notes saved");
    Ok(())
}
