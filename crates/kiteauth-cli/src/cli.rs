//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use kiteauth_http::{DEFAULT_API_URL, DEFAULT_LOGIN_URL};

use crate::commands::{login, logout, request, status, totp};

/// Kite Connect login and authenticated request tool.
///
/// Credentials are read from the environment (`API_KEY`, `API_SECRET`,
/// `USER_ID`, `PASSWORD`, `TOTP_SECRET`, `REDIRECT_URI`), optionally with a
/// common prefix. A `.env` file in the working directory is loaded first.
#[derive(Parser, Debug)]
#[command(name = "kiteauth")]
#[command(author, version = env!("KITEAUTH_VERSION"), about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Directory holding persisted sessions
    #[arg(long, env = "KITEAUTH_SESSION_DIR", global = true)]
    pub session_dir: Option<PathBuf>,

    /// Base URL of the Kite login host
    #[arg(long, env = "KITEAUTH_LOGIN_URL", default_value = DEFAULT_LOGIN_URL, global = true)]
    pub login_url: String,

    /// Base URL of the Kite Connect API host
    #[arg(long, env = "KITEAUTH_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// Prefix for credential variables, e.g. `KITE_` reads `KITE_API_KEY`
    #[arg(long, env = "KITEAUTH_ENV_PREFIX", default_value = "", global = true)]
    pub env_prefix: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in, reusing a persisted session when it is still valid
    Login(login::LoginArgs),

    /// Show the persisted session without contacting the broker
    Status(status::StatusArgs),

    /// Send an authenticated request to the Kite Connect API
    Request(request::RequestArgs),

    /// Revoke the access token and forget the persisted session
    Logout(logout::LogoutArgs),

    /// Print the current TOTP code
    Totp(totp::TotpArgs),
}
