use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use agent_chat::agent::AgentClient;
use agent_chat::agent::config::AgentConfig;
use agent_chat::conversation::{Conversation, ConversationConfig, Outcome};
use agent_chat::{agent::AgentError, render};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

const LOADING_TICK: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] AgentError),
    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("send task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("no completion: {0}")]
    NoCompletion(String),
    #[error("prompt is empty")]
    EmptyPrompt,
}

#[derive(Parser, Debug)]
#[command(name = "agent-chat", about = "Chat with a hosted Bedrock agent")]
struct Cli {
    /// Seconds to wait for one agent reply before giving up.
    #[arg(long, env = "CHAT_TIMEOUT_SECS", value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive session (default).
    Chat,
    /// Send one prompt, print the reply, and exit.
    Ask { prompt: String },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut chat_config = ConversationConfig::from_env()?;
    if let Some(secs) = cli.timeout_secs {
        chat_config = chat_config.with_timeout(Duration::from_secs(secs));
    }
    let agent_config = AgentConfig::from_env()?;
    let client = AgentClient::from_config(&agent_config)?;
    tracing::info!(
        agent_id = %client.agent_id(),
        agent_alias_id = %client.agent_alias_id(),
        region = %agent_config.region,
        timeout_secs = chat_config.timeout.as_secs(),
        "agent client initialized"
    );

    let conversation = Conversation::new(Arc::new(client), chat_config);

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => run_chat(&conversation).await,
        Command::Ask { prompt } => run_ask(&conversation, &prompt).await,
    }
}

async fn run_ask(conversation: &Conversation, prompt: &str) -> Result<(), CliError> {
    let handle = conversation.submit(prompt).ok_or(CliError::EmptyPrompt)?;
    match wait_with_indicator(handle).await? {
        Outcome::Completed(text) => {
            println!("{text}");
            Ok(())
        }
        Outcome::TimedOut => Err(CliError::NoCompletion("timed out".into())),
        Outcome::Failed(e) => Err(CliError::NoCompletion(e.to_string())),
        Outcome::Discarded => Err(CliError::NoCompletion("discarded".into())),
    }
}

async fn run_chat(conversation: &Conversation) -> Result<(), CliError> {
    for message in conversation.messages() {
        println!("{}", render::terminal(&message));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => {}
            "/quit" => break,
            "/clear" => {
                conversation.clear();
                for message in conversation.messages() {
                    println!("{}", render::terminal(&message));
                }
            }
            text => {
                let Some(handle) = conversation.submit(text) else {
                    continue;
                };
                if matches!(wait_with_indicator(handle).await?, Outcome::Discarded) {
                    continue;
                }
                if let Some(reply) = conversation.messages().last() {
                    println!("{}", render::terminal(reply));
                }
            }
        }
    }
    Ok(())
}

fn prompt() -> Result<(), CliError> {
    let mut out = std::io::stdout();
    write!(out, "you> ")?;
    out.flush()?;
    Ok(())
}

/// Await a send while redrawing the loading indicator on stderr.
async fn wait_with_indicator(mut handle: JoinHandle<Outcome>) -> Result<Outcome, CliError> {
    let mut ticker = tokio::time::interval(LOADING_TICK);
    let mut tick = 0usize;
    let mut err = std::io::stderr();
    let outcome = loop {
        tokio::select! {
            joined = &mut handle => break joined?,
            _ = ticker.tick() => {
                write!(err, "\r{:<10}", render::loading_text(tick))?;
                err.flush()?;
                tick += 1;
            }
        }
    };
    write!(err, "\r\x1b[K")?;
    err.flush()?;
    Ok(outcome)
}
