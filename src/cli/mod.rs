pub mod commands;

use chrono::{Duration, Utc};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::auth::{Identity, TokenError, TokenVerifier};
use crate::chat::SessionManager;
use crate::cli::commands::{Commands, SessionAction, TokenAction};
use crate::client::{self, ChatView, HttpChatClient, Sender, ViewMessage};
use crate::config::AppConfig;
use crate::db::{self, StoreError};
use crate::error::AppError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    App(#[from] AppError),
    #[error("token error: {0}")]
    Token(#[from] TokenError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Usage(String),
}

pub async fn run_cli(command: Commands, config_path: String) -> Result<(), CliError> {
    match command {
        Commands::Serve => Err(CliError::Usage(
            "serve is handled by the server entrypoint".to_string(),
        )),
        Commands::Session { action } => {
            let config = AppConfig::load(&config_path)?;
            run_session_action(action, &config).await
        }
        Commands::Token { action } => {
            let config = AppConfig::load(&config_path)?;
            run_token_action(action, &config)
        }
        Commands::Chat {
            server,
            token,
            language,
        } => run_repl(server, token, language).await,
    }
}

/// Identity for an operator acting on an owner's sessions from the terminal.
fn operator_identity(owner: &str) -> Identity {
    let now = Utc::now();
    Identity {
        subject: owner.to_string(),
        issued_at: now,
        expires_at: now,
    }
}

async fn run_session_action(action: SessionAction, config: &AppConfig) -> Result<(), CliError> {
    let sessions = SessionManager::new(db::open_store(config)?);

    match action {
        SessionAction::List { owner } => {
            let listings = sessions.list_sessions(&operator_identity(&owner)).await?;
            if listings.is_empty() {
                println!("No sessions found.");
                return Ok(());
            }
            println!("{:<38} | {:<20} | {}", "ID", "Last Active", "Label");
            println!("{:-<38}-+-{:-<20}-+-{:-<20}", "", "", "");
            for listing in listings {
                println!(
                    "{:<38} | {:<20} | {}",
                    listing.session.id,
                    listing.session.last_active_at.format("%Y-%m-%d %H:%M:%S"),
                    listing.display_label
                );
            }
        }
        SessionAction::Delete { id, owner } => {
            sessions.delete_session(&id, &operator_identity(&owner)).await?;
            println!("Deleted session {}", id);
        }
        SessionAction::Export { id, owner, path } => {
            let export = sessions.export_session(&id, &operator_identity(&owner)).await?;
            let export_path = path.unwrap_or_else(|| format!("session_{}.txt", id));
            tokio::fs::write(&export_path, export).await?;
            println!("Session exported successfully to: {}", export_path);
        }
    }
    Ok(())
}

fn run_token_action(action: TokenAction, config: &AppConfig) -> Result<(), CliError> {
    match action {
        TokenAction::Issue { subject, minutes } => {
            let lifetime = token_lifetime(minutes.unwrap_or(config.auth.token_expiry_minutes))?;
            let verifier = TokenVerifier::new(&config.auth.jwt_secret);
            let token = verifier.issue(&subject, lifetime)?;
            println!("{}", token);
        }
    }
    Ok(())
}

fn token_lifetime(minutes: i64) -> Result<Duration, CliError> {
    Duration::try_minutes(minutes)
        .filter(|lifetime| *lifetime > Duration::zero())
        .ok_or_else(|| {
            CliError::Usage(format!("--minutes must be between 1 and {}", i64::MAX / 60_000))
        })
}

const REPL_HELP: &str = "Commands: /new, /sessions, /switch <n|id>, /delete <n|id>, /help, /exit";

async fn run_repl(server: String, token: String, language: String) -> Result<(), CliError> {
    let http = HttpChatClient::new(server.clone(), token);
    let mut view = ChatView::new(language);

    let effects = view.mount();
    client::drive(&mut view, &http, effects).await;

    println!("--- Counsel Terminal Chat ---");
    println!("Connected to: {}", server);
    println!("{}", REPL_HELP);
    println!("-----------------------------");
    print_sessions(&view);

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        stdout.write_all(b"\nYou> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        let (command, arg) = match text.split_once(' ') {
            Some((command, arg)) => (command, arg.trim()),
            None => (text, ""),
        };

        match command {
            "/exit" | "/quit" => break,
            "/help" => println!("{}", REPL_HELP),
            "/new" => {
                view.new_chat();
                println!("Started a new chat. Your first message will create the session.");
            }
            "/sessions" => {
                client::drive(&mut view, &http, vec![client::Effect::FetchSessions]).await;
                print_sessions(&view);
            }
            "/switch" => {
                let Some(id) = resolve_session_arg(&view, arg) else {
                    println!("No such session: {}", arg);
                    continue;
                };
                let effects = view.select_session(&id);
                client::drive(&mut view, &http, effects).await;
                print_messages(view.messages());
            }
            "/delete" => {
                let Some(id) = resolve_session_arg(&view, arg) else {
                    println!("No such session: {}", arg);
                    continue;
                };
                match view.request_delete(&id) {
                    Ok(effects) => {
                        client::drive(&mut view, &http, effects).await;
                        match view.last_failure() {
                            Some(cause) => println!("Delete failed: {}", cause.display_text()),
                            None => println!("Deleted session {}", id),
                        }
                    }
                    Err(rejected) => println!("Cannot delete: {}", rejected),
                }
            }
            _ if command.starts_with('/') => println!("Unknown command. {}", REPL_HELP),
            _ => {
                if !view.network_up() && http.health().await {
                    view.set_network(true);
                }
                match view.send(text) {
                    Ok(effects) => {
                        let shown = view.messages().len();
                        client::drive(&mut view, &http, effects).await;
                        print_messages(view.messages().get(shown..).unwrap_or_default());
                    }
                    Err(rejected) => println!("Not sent: {}", rejected),
                }
            }
        }
    }
    Ok(())
}

/// Accepts either a 1-based index into the listing or a session id.
fn resolve_session_arg(view: &ChatView, arg: &str) -> Option<String> {
    if let Ok(index) = arg.parse::<usize>() {
        return index
            .checked_sub(1)
            .and_then(|i| view.sessions().get(i))
            .map(|s| s.session_id.clone());
    }
    view.sessions()
        .iter()
        .find(|s| s.session_id == arg)
        .map(|s| s.session_id.clone())
}

fn print_sessions(view: &ChatView) {
    if view.sessions().is_empty() {
        println!("No sessions yet.");
        return;
    }
    for (i, session) in view.sessions().iter().enumerate() {
        let marker = if view.current_session_id() == Some(session.session_id.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{}{:>3}. {} ({})",
            marker,
            i + 1,
            session.label,
            session.last_active.format("%Y-%m-%d %H:%M")
        );
    }
}

fn print_messages(messages: &[ViewMessage]) {
    for message in messages {
        match (message.sender, message.is_error) {
            (_, true) => println!("[error] {}", message.text),
            (Sender::User, false) => println!("You> {}", message.text),
            (Sender::Assistant, false) => println!("Counsel> {}", message.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_lifetime_accepts_positive_minutes() {
        assert_eq!(token_lifetime(30).unwrap(), Duration::minutes(30));
    }

    #[test]
    fn token_lifetime_rejects_zero_and_overflow() {
        assert!(matches!(token_lifetime(0), Err(CliError::Usage(_))));
        assert!(matches!(token_lifetime(-5), Err(CliError::Usage(_))));
        assert!(matches!(token_lifetime(i64::MAX), Err(CliError::Usage(_))));
    }
}
