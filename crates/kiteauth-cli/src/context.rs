//! Builds the session manager and store from CLI options.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use url::Url;

use kiteauth_core::{Credentials, Totp};
use kiteauth_file::FileStore;
use kiteauth_http::{KiteAuthenticator, KiteEndpoints, KiteSessionManager};

use crate::cli::GlobalArgs;

const CREDENTIAL_HELP: &str =
    "set API_KEY, API_SECRET, USER_ID, PASSWORD and TOTP_SECRET (or a .env file)";

/// Resolve the session directory: explicit option first, then the
/// platform data directory.
pub fn session_dir(global: &GlobalArgs) -> Result<PathBuf> {
    if let Some(dir) = &global.session_dir {
        return Ok(dir.clone());
    }

    let dirs =
        ProjectDirs::from("", "", "kiteauth").context("Could not determine data directory")?;
    Ok(dirs.data_dir().join("sessions"))
}

/// Open the session store.
pub fn store(global: &GlobalArgs) -> Result<FileStore> {
    Ok(FileStore::new(session_dir(global)?))
}

/// Read one credential variable, honoring the configured prefix.
pub fn env_var(global: &GlobalArgs, name: &str) -> Option<String> {
    std::env::var(format!("{}{}", global.env_prefix, name))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

/// Load and validate credentials from the environment.
pub fn credentials(global: &GlobalArgs) -> Result<Credentials> {
    Credentials::from_env_prefixed(&global.env_prefix)
        .with_context(|| format!("Invalid credentials; {}", CREDENTIAL_HELP))
}

/// Load only the TOTP seed.
pub fn totp(global: &GlobalArgs) -> Result<Totp> {
    let secret = env_var(global, "TOTP_SECRET").unwrap_or_default();
    Totp::new(&secret).context("Invalid TOTP_SECRET")
}

/// Parse the configured broker base URLs.
pub fn endpoints(global: &GlobalArgs) -> Result<KiteEndpoints> {
    let login = Url::parse(&global.login_url).context("Invalid --login-url")?;
    let api = Url::parse(&global.api_url).context("Invalid --api-url")?;
    Ok(KiteEndpoints::new(login, api))
}

/// Build the authenticator backed by the file store.
pub fn authenticator(global: &GlobalArgs) -> Result<KiteAuthenticator> {
    let credentials = credentials(global)?;
    let endpoints = endpoints(global)?;
    let store = Arc::new(store(global)?);

    KiteAuthenticator::new(credentials, endpoints, store).context("Failed to build HTTP client")
}

/// Build the session manager backed by the file store.
pub fn manager(global: &GlobalArgs) -> Result<KiteSessionManager> {
    Ok(authenticator(global)?.into_manager())
}
