use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "counsel", version, about = "Counsel chat assistant server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the config file path globally
    #[arg(short, long, global = true, default_value = "config.yaml")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    Serve,

    /// Chat with a running server from the terminal
    Chat {
        /// Base URL of the server
        #[arg(short, long, default_value = "http://127.0.0.1:8000")]
        server: String,
        /// Bearer token (see `token issue`)
        #[arg(short, long, env = "COUNSEL_TOKEN")]
        token: String,
        /// Reply language tag
        #[arg(short, long, default_value = "en")]
        language: String,
    },

    /// Inspect and manage stored sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Issue bearer tokens signed with the configured secret
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand)]
pub enum SessionAction {
    /// List live sessions for an owner
    List {
        #[arg(short, long)]
        owner: String,
    },

    /// Delete a session
    Delete {
        id: String,
        #[arg(short, long)]
        owner: String,
    },

    /// Export a session transcript to a .txt file
    Export {
        id: String,
        #[arg(short, long)]
        owner: String,
        /// The path to the output file (optional)
        #[arg(short, long)]
        path: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum TokenAction {
    /// Issue a token for a subject
    Issue {
        #[arg(short, long)]
        subject: String,
        /// Lifetime in minutes; defaults to auth.token_expiry_minutes
        #[arg(short, long)]
        minutes: Option<i64>,
    },
}
