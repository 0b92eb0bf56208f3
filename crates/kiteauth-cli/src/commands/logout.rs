//! Logout command implementation.

use anyhow::{Context, Result};
use clap::Args;
use tracing::warn;

use kiteauth_core::SessionStore;

use crate::cli::GlobalArgs;
use crate::context;
use crate::output;

#[derive(Args, Debug)]
pub struct LogoutArgs {}

pub async fn run(_args: LogoutArgs, global: &GlobalArgs) -> Result<()> {
    let authenticator = context::authenticator(global)?;
    let user_id = authenticator.credentials().user_id().to_string();

    let store = context::store(global)?;
    let persisted = match store.load(&user_id).await {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable persisted session");
            None
        }
    };

    let Some(session) = persisted else {
        store
            .clear(&user_id)
            .await
            .context("Failed to remove session file")?;
        output::success("No active session");
        return Ok(());
    };

    authenticator
        .with_session(session)
        .into_manager()
        .logout()
        .await
        .context("Logout failed")?;

    output::success("Logged out");
    Ok(())
}
