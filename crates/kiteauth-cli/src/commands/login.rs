//! Login command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use kiteauth_core::StatusSnapshot;

use crate::cli::GlobalArgs;
use crate::context;
use crate::output::{self, SessionSummary};

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginReport {
    #[serde(flatten)]
    status: StatusSnapshot,
    restored: bool,
    session: SessionSummary,
}

pub async fn run(args: LoginArgs, global: &GlobalArgs) -> Result<()> {
    let manager = context::manager(global)?;

    eprintln!("{}", "Logging in...".dimmed());
    let outcome = manager.initialize().await.context("Login failed")?;

    let restored = outcome.is_restored();
    let summary = SessionSummary::from(outcome.session());

    if args.json {
        return output::json(&LoginReport {
            status: manager.get_status(),
            restored,
            session: summary,
        });
    }

    if restored {
        output::success("Reusing persisted session");
    } else {
        output::success("Logged in successfully");
    }
    println!();
    output::field("Status", &output::state(manager.get_status().status));
    summary.print();

    Ok(())
}
