//! Core traits for authenticators and session stores.

mod authenticator;
mod store;

pub use authenticator::{Authenticator, LoginOutcome, RequestMethod};
pub use store::SessionStore;
