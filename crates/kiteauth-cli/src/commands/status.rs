//! Status command implementation.

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;

use kiteauth_core::SessionStore;

use crate::cli::GlobalArgs;
use crate::context;
use crate::output::{self, SessionSummary};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// User id to look up (defaults to USER_ID)
    #[arg(long)]
    pub user_id: Option<String>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: StatusArgs, global: &GlobalArgs) -> Result<()> {
    let user_id = args
        .user_id
        .or_else(|| context::env_var(global, "USER_ID"))
        .context("No user id. Pass --user-id or set USER_ID.")?;

    let store = context::store(global)?;
    let session = store
        .load(&user_id)
        .await
        .context("Failed to read persisted session")?;

    match (session, args.json) {
        (None, true) => output::json(&json!({"userId": user_id, "persisted": false})),
        (None, false) => {
            output::field("User", &user_id);
            println!("No persisted session. Run 'kiteauth login' first.");
            Ok(())
        }
        (Some(session), true) => {
            let mut value = serde_json::to_value(SessionSummary::from(&session))?;
            value["persisted"] = json!(true);
            output::json(&value)
        }
        (Some(session), false) => {
            SessionSummary::from(&session).print();
            Ok(())
        }
    }
}
