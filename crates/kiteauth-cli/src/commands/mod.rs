//! Subcommand implementations.

pub mod login;
pub mod logout;
pub mod request;
pub mod status;
pub mod totp;

use anyhow::Result;

use crate::cli::{Commands, GlobalArgs};

pub async fn handle(command: Commands, global: &GlobalArgs) -> Result<()> {
    match command {
        Commands::Login(args) => login::run(args, global).await,
        Commands::Status(args) => status::run(args, global).await,
        Commands::Request(args) => request::run(args, global).await,
        Commands::Logout(args) => logout::run(args, global).await,
        Commands::Totp(args) => totp::run(args, global),
    }
}
