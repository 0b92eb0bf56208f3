//! TOTP command implementation.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde_json::json;

use crate::cli::GlobalArgs;
use crate::context;
use crate::output;

#[derive(Args, Debug)]
pub struct TotpArgs {
    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: TotpArgs, global: &GlobalArgs) -> Result<()> {
    let totp = context::totp(global)?;
    let remaining = totp.seconds_remaining();
    let code = totp.generate_now();

    if args.json {
        return output::json(&json!({"code": code, "validFor": remaining}));
    }

    println!("{}", code);
    eprintln!("{}", format!("valid for {}s", remaining).dimmed());
    Ok(())
}
