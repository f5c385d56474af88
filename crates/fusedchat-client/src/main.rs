use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use fusedchat_client::api::{GatewayClient, StatusSource};
use fusedchat_client::chat::ChatClient;
use fusedchat_client::session::HistoryArchive;
use fusedchat_proto::config::Config;
use fusedchat_proto::message::{ChatSession, Role};

#[derive(Parser)]
#[command(name = "fusedchat", about = "Podcast tasks from the command line")]
struct Cli {
    /// Gateway base URL (overrides config)
    #[arg(long, global = true)]
    gateway: Option<String>,

    /// User id sent in the x-user-id header (overrides config)
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a podcast from an uploaded file and wait for it
    Podcast {
        server_filename: String,
        document_name: String,
    },
    /// Query a task's status once
    Status { task_id: String },
    /// Saved chat sessions
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },
}

#[derive(Subcommand)]
enum HistoryCommand {
    List,
    Show { session_id: String },
    /// Load a session and wait for its unfinished tasks
    Resume { session_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let data_dir = fusedchat_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("client.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    tracing::info!("fusedchat starting");

    let mut config = Config::load()?;
    config.apply_env(|key| std::env::var(key).ok());
    if let Some(url) = cli.gateway {
        config.client.gateway_url = url;
    }
    if let Some(user) = cli.user {
        config.client.user_id = user;
    }

    let archive = HistoryArchive::new(&config.client.history_dir);
    let interval = Duration::from_secs(config.client.poll_interval_secs.max(1));

    match cli.command {
        Command::Podcast {
            server_filename,
            document_name,
        } => {
            let chat = ChatClient::new(connect(&config)?, archive, interval);
            let started = chat.start_podcast(&server_filename, &document_name).await;
            print_notices(&chat);
            if let Err(e) = started {
                chat.save().await?;
                return Err(e.into());
            }
            wait_and_save(&chat).await?;
        }
        Command::Status { task_id } => {
            let report = connect(&config)?.task_status(&task_id).await?;
            println!("{}: {}", task_id, report.status);
            if let Some(url) = report.audio_url {
                println!("audio: {}", url);
            }
            if let Some(err) = report.error {
                println!("error: {}", err);
            }
        }
        Command::History { command } => match command {
            HistoryCommand::List => list_history(&archive).await?,
            HistoryCommand::Show { session_id } => {
                print_session(&archive.load(&session_id).await?);
            }
            HistoryCommand::Resume { session_id } => {
                let chat = ChatClient::new(connect(&config)?, archive, interval);
                chat.load_from_history(&session_id).await?;
                print_notices(&chat);
                wait_and_save(&chat).await?;
            }
        },
    }

    Ok(())
}

fn connect(config: &Config) -> anyhow::Result<Arc<GatewayClient>> {
    if config.client.user_id.is_empty() {
        anyhow::bail!(
            "No user id configured. Pass --user, set FUSEDCHAT_USER_ID, or add user_id to {}",
            Config::config_path().display()
        );
    }
    let client = GatewayClient::new(&config.client.gateway_url, config.client.user_id.clone())
        .context("Bad gateway URL")?;
    Ok(Arc::new(client))
}

async fn wait_and_save(chat: &ChatClient<GatewayClient>) -> anyhow::Result<()> {
    tokio::select! {
        _ = chat.wait_for_tasks() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, cancelling polls");
            chat.shutdown();
        }
    }
    print_notices(chat);
    print_session(&chat.session().snapshot().await);
    if let Some(path) = chat.save().await? {
        println!("Saved session to {}", path.display());
    }
    Ok(())
}

async fn list_history(archive: &HistoryArchive) -> anyhow::Result<()> {
    let entries = archive.list().await?;
    if entries.is_empty() {
        println!("No saved sessions in {}", archive.dir().display());
    }
    for entry in entries {
        let when = entry
            .last_activity
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "{}  {:>16}  {} messages",
            entry.session_id, when, entry.message_count
        );
    }
    Ok(())
}

fn print_session(session: &ChatSession) {
    for message in &session.messages {
        let who = match message.role {
            Role::User => "you",
            Role::Model => "bot",
        };
        println!("[{}] {}", who, message.render_text());
    }
}

fn print_notices(chat: &ChatClient<GatewayClient>) {
    for line in chat.drain_notices().into_iter().chain(chat.notice_lines()) {
        eprintln!("{}", line);
    }
}
