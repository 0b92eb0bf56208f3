//! Request command implementation.

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;

use kiteauth_core::RequestMethod;

use crate::cli::GlobalArgs;
use crate::context;
use crate::output;

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// HTTP method: GET, POST, PUT or DELETE
    pub method: RequestMethod,

    /// API path, e.g. /user/profile
    pub endpoint: String,

    /// Parameters as a JSON object
    #[arg(long, value_parser = parse_json_object)]
    pub data: Option<Value>,

    /// Print compact JSON
    #[arg(long)]
    pub compact: bool,
}

fn parse_json_object(raw: &str) -> std::result::Result<Value, String> {
    let value: Value = serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {}", e))?;
    if !value.is_object() {
        return Err("expected a JSON object".to_string());
    }
    Ok(value)
}

pub async fn run(args: RequestArgs, global: &GlobalArgs) -> Result<()> {
    let manager = context::manager(global)?;
    manager.initialize().await.context("Login failed")?;

    let response = manager
        .make_authenticated_request(&args.endpoint, args.method, args.data.as_ref())
        .await
        .with_context(|| format!("{} {} failed", args.method, args.endpoint))?;

    if args.compact {
        output::json(&response)
    } else {
        output::json_pretty(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_must_be_an_object() {
        assert!(parse_json_object(r#"{"i":"NSE:INFY"}"#).is_ok());
        assert!(parse_json_object("[1,2]").is_err());
        assert!(parse_json_object("{oops").is_err());
    }
}
