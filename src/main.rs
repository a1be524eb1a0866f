#![forbid(unsafe_code)]

//! `acp-client`: interactive ACP client binary.
//!
//! Loads configuration, connects to the ACP server, reads prompts from stdin,
//! shows replies as they stream in, and asks before running tool calls.
//! The transcript is saved to the session store on exit.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use acp_session_client::acp::connection::Connection;
use acp_session_client::acp::MessageSender;
use acp_session_client::config::ClientConfig;
use acp_session_client::session::{
    ConsolePresenter, Presenter, Prompter, SessionOutbox, SessionRouter,
};
use acp_session_client::tools::ToolDispatcher;
use acp_session_client::transcript::store::{SessionRecord, SessionStore};
use acp_session_client::transcript::{Transcript, TranscriptSink};
use acp_session_client::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "acp-client", about = "Interactive ACP client", version, long_about = None)]
struct Cli {
    /// Path to an optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// WebSocket URL of the ACP server.
    #[arg(short, long, env = "ACP_WS_URL")]
    url: Option<String>,

    /// Model to request in every prompt.
    #[arg(short, long, env = "ACP_MODEL")]
    model: Option<String>,

    /// Workspace directory tool calls operate in.
    #[arg(short, long, env = "ACP_WORKSPACE_DIR")]
    workspace: Option<PathBuf>,

    /// API key sent as a bearer token (defaults to keychain or `ACP_API_KEY`).
    #[arg(short = 'k', long)]
    api_key: Option<String>,

    /// Resume a saved session by name.
    #[arg(short, long)]
    session: Option<String>,

    /// List saved sessions and exit.
    #[arg(long)]
    list_sessions: bool,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?;
    let result = runtime.block_on(run(args));
    // A stdin read may still be parked on the blocking pool.
    runtime.shutdown_timeout(Duration::from_millis(250));

    if let Err(err) = &result {
        error!(%err, "acp-client exited with error");
    }
    result
}

#[allow(clippy::too_many_lines)] // Startup, run and shutdown form one sequence.
async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match args.config.as_deref() {
        Some(path) => ClientConfig::load_from_path(path)?,
        None => ClientConfig::default(),
    };
    let store = SessionStore::new(config.sessions_dir.clone());

    if args.list_sessions {
        return print_sessions(&store);
    }

    let resumed = match args.session.as_deref() {
        Some(name) => Some(load_session(&store, name)?),
        None => None,
    };

    if let Some(url) = args.url {
        config.url = url;
    }
    match (args.model, resumed.as_ref()) {
        (Some(model), _) => config.model = Some(model),
        (None, Some(record)) if record.metadata.model.is_some() => {
            config.model.clone_from(&record.metadata.model);
        }
        _ => {}
    }
    match (args.workspace, resumed.as_ref()) {
        (Some(workspace), _) => config.workspace_root = workspace,
        (None, Some(record)) => config.workspace_root = PathBuf::from(&record.metadata.workspace),
        (None, None) => {}
    }

    if let Some(key) = args.api_key {
        config.api_key = Some(key);
    }
    config.load_credentials().await?;
    config.validate()?;
    config.prepare_workspace()?;
    info!(url = %config.url, workspace = %config.workspace_root.display(), "configuration loaded");

    // ── Build the session ───────────────────────────────
    let presenter: Arc<dyn Presenter> = Arc::new(ConsolePresenter);
    presenter.info(&format!(
        "Model: {}",
        config.model.as_deref().unwrap_or("(server default)")
    ));
    presenter.info(&format!("Workspace: {}", config.workspace_root.display()));

    let transcript = Arc::new(match resumed {
        Some(record) => {
            presenter.info(&format!(
                "Resuming session {} ({} previous message(s))",
                args.session.as_deref().unwrap_or_default(),
                record.entries.len()
            ));
            Transcript::from_entries(record.entries)
        }
        None => Transcript::new(),
    });
    let sink: Arc<dyn TranscriptSink> = transcript.clone();

    let connection = Connection::new(config.url.clone(), config.api_key.clone());
    let events = SessionRouter::attach(&connection);

    presenter.info(&format!("Connecting to {} ...", config.url));
    if let Err(err) = connection.connect(config.connect_timeout()).await {
        presenter.error(&format!("Connection failed: {err}"));
        return Err(err);
    }
    presenter.info("Connected.");

    let prompter = Prompter::new(Arc::clone(&presenter));
    let sender: Arc<dyn MessageSender> = Arc::new(connection.clone());
    let dispatcher = ToolDispatcher::new(
        config.workspace()?,
        Arc::clone(&sender),
        Arc::new(prompter.clone()),
    );
    let router = SessionRouter::new(
        config.reassembler(),
        dispatcher,
        Arc::clone(&presenter),
        Arc::clone(&sink),
    );
    let outbox = SessionOutbox::new(sender, sink, config.model.clone());

    // ── Run ─────────────────────────────────────────────
    let shutdown = CancellationToken::new();
    let session_over = CancellationToken::new();

    let router_shutdown = shutdown.clone();
    let router_over = session_over.clone();
    let router_handle = tokio::spawn(async move {
        router.run(events, router_shutdown).await;
        router_over.cancel();
    });
    let stdin_handle = tokio::spawn(read_stdin(prompter.clone()));

    tokio::select! {
        () = cli_loop(&prompter, &outbox) => info!("input finished"),
        () = session_over.cancelled() => info!("session ended by connection close"),
        () = shutdown_signal() => info!("shutdown signal received"),
    }

    // ── Shutdown ────────────────────────────────────────
    prompter.close();
    shutdown.cancel();
    connection.close();
    stdin_handle.abort();
    if let Err(err) = router_handle.await {
        warn!(%err, "router task did not finish cleanly");
    }

    if transcript.is_empty() {
        info!("nothing to save, transcript is empty");
        return Ok(());
    }

    let name = args
        .session
        .unwrap_or_else(|| format!("session-{}", Utc::now().timestamp_millis()));
    match store.save(
        &name,
        config.model.as_deref(),
        &config.workspace_root,
        transcript.entries(),
    ) {
        Ok(path) => presenter.info(&format!("Session saved to {}", path.display())),
        Err(err) => {
            presenter.error(&format!("Failed to save session: {err}"));
            return Err(err);
        }
    }

    Ok(())
}

/// Prompt for input until `exit`, `quit` or end of input.
async fn cli_loop(prompter: &Prompter, outbox: &SessionOutbox) {
    loop {
        let Some(line) = prompter.ask("> ", false).await else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }
        if let Err(err) = outbox.send_user(input) {
            error!(%err, "failed to send prompt");
        }
    }
}

/// Feed stdin lines to the prompter; closes it at end of input.
async fn read_stdin(prompter: Prompter) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                prompter.answer_line(&line);
            }
            Ok(None) => break,
            Err(err) => {
                warn!(%err, "failed to read stdin");
                break;
            }
        }
    }
    prompter.close();
}

fn load_session(store: &SessionStore, name: &str) -> Result<SessionRecord> {
    let record = store.load(name)?;
    if record.entries.is_empty() {
        return Err(AppError::Transcript(format!(
            "session {name} contains no messages"
        )));
    }
    info!(name, entries = record.entries.len(), "session loaded");
    Ok(record)
}

fn print_sessions(store: &SessionStore) -> Result<()> {
    let sessions = store.list()?;
    if sessions.is_empty() {
        println!("No saved sessions in {}", store.dir().display());
        return Ok(());
    }
    println!("Saved sessions:");
    for session in sessions {
        println!(
            "  {}  model: {}  updated: {}  {} message(s)",
            session.name,
            session.model.as_deref().unwrap_or("-"),
            session.last_updated.format("%Y-%m-%d %H:%M:%S UTC"),
            session.entry_count
        );
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
