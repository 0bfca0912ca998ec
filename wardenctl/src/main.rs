//! `wardenctl`: drive a warden session from the command line.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use warden_config::ConfigLoader;
use warden_core::{Credentials, RefreshError, Session, SessionState};

#[derive(Parser, Debug)]
#[command(name = "wardenctl", about = "Bearer session client for warden-protected APIs")]
struct Cli {
    #[command(flatten)]
    sources: SourceArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Debug, Clone)]
struct SourceArgs {
    /// TOML configuration file
    #[arg(long, global = true, env = "WARDEN_CONFIG")]
    config: Option<PathBuf>,

    /// .env file consulted below the process environment
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log in and persist the issued tokens
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "WARDEN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Show whether a session is stored and when its access token expires
    Status,
    /// GET a path with the stored session and print the JSON response
    Get {
        /// Path relative to the base URL, e.g. /users/me/
        path: String,
    },
    /// Exchange the refresh token for a new access token now
    Refresh,
    /// Forget the stored session
    Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    let cli = Cli::parse();
    let session = open_session(&cli.sources)?;

    match cli.command {
        Command::Login { username, password } => {
            session
                .login(&Credentials { username, password })
                .await
                .context("login failed")?;
            println!("Logged in");
        }
        Command::Status => print_status(&session),
        Command::Get { path } => {
            require_session(&session)?;
            let body: serde_json::Value = session
                .client()
                .get_json(&path)
                .await
                .with_context(|| format!("GET {path} failed"))?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Refresh => {
            require_session(&session)?;
            match session.coordinator().refresh().await {
                Ok(token) => println!("Refreshed access token {}", token.redacted()),
                Err(RefreshError::Superseded) => println!("Session changed, nothing refreshed"),
                Err(e) => return Err(e).context("refresh failed, please log in again"),
            }
        }
        Command::Logout => {
            session.logout().context("failed to clear stored tokens")?;
            println!("Logged out");
        }
    }

    Ok(())
}

fn open_session(sources: &SourceArgs) -> Result<Session> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &sources.config {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = &sources.env_file {
        loader = loader.with_env_file(path);
    }

    let load = loader.load().context("failed to load configuration")?;
    log::debug!(
        "[wardenctl] Using API at {} ({} config warning(s))",
        load.config.api.base_url,
        load.warnings.items.len()
    );

    Session::from_config(load.config).context("failed to open session")
}

fn require_session(session: &Session) -> Result<()> {
    if session.restore() {
        Ok(())
    } else {
        anyhow::bail!("no stored session, run `wardenctl login` first")
    }
}

fn print_status(session: &Session) {
    if !session.restore() {
        println!("Not logged in");
        return;
    }

    let state = match session.state() {
        SessionState::Valid => "valid",
        SessionState::ExpiringSoon => "expiring soon",
        SessionState::Expired => "expired",
    };
    println!("Session: {state}");
    match session.monitor().time_until_expiry() {
        Some(left) if left.num_seconds() > 0 => {
            println!("Access token expires in {}s", left.num_seconds());
        }
        Some(left) => println!("Access token expired {}s ago", -left.num_seconds()),
        None => println!("Access token expiry unknown"),
    }
}
