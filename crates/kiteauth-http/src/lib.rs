//! kiteauth-http - Kite Connect authenticator.
//!
//! Implements [`Authenticator`](kiteauth_core::Authenticator) against the
//! Kite web login and REST API: password, TOTP, request token capture and
//! token exchange, followed by authenticated request proxying.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use kiteauth_core::{MemoryStore, RequestMethod};
//! use kiteauth_http::KiteAuthenticator;
//!
//! # async fn example() -> kiteauth_core::Result<()> {
//! let manager = KiteAuthenticator::from_env(Arc::new(MemoryStore::new()))?.into_manager();
//! manager.initialize().await?;
//!
//! let margins = manager
//!     .make_authenticated_request("/user/margins", RequestMethod::Get, None)
//!     .await?;
//! println!("{}", margins);
//! # Ok(())
//! # }
//! ```

mod authenticator;
mod client;
mod endpoints;
pub mod handshake;

pub use authenticator::{KiteAuthenticator, KiteSessionManager};
pub use client::{DEFAULT_TIMEOUT, KiteClient};
pub use endpoints::{DEFAULT_API_URL, DEFAULT_LOGIN_URL, KITE_VERSION, KiteEndpoints};
