//! kiteauth-core - Session types, TOTP and the login state machine.
//!
//! This crate holds everything that does not speak HTTP: validated
//! [`Credentials`], the [`Session`] record, the TOTP generator and token
//! exchange checksum, the [`Authenticator`] and [`SessionStore`] seams, and
//! the [`SessionManager`] that turns an authenticator into an observable,
//! single-flight login service.

pub mod credentials;
pub mod error;
pub mod manager;
pub mod otp;
pub mod session;
pub mod state;
pub mod store;
pub mod tokens;
pub mod traits;

pub use credentials::{Credentials, DEFAULT_REDIRECT_URI};
pub use error::{
    CredentialError, Error, LoginError, LoginStep, ProtocolError, StorageError, TransportError,
};
pub use manager::SessionManager;
pub use otp::{Totp, checksum};
pub use session::Session;
pub use state::{LoginState, ManagerEvent, StatusSnapshot};
pub use store::MemoryStore;
pub use tokens::{AccessToken, RequestToken};
pub use traits::{Authenticator, LoginOutcome, RequestMethod, SessionStore};

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
