//! Authentication module for the admin session.
//!
//! This module provides:
//! - `SessionManager`: login, logout and startup verification over a reactive session state
//! - `CredentialStore`: durable storage of the token and user snapshot (file or OS keyring)
//!
//! Credentials are written as a single record and are verified with the
//! server on every start before the session is trusted.

pub mod credentials;
pub mod session;

pub use credentials::{
    CredentialRecord, CredentialStore, FileCredentialStore, KeyringCredentialStore,
};
pub use session::{LoginError, SessionManager, SessionState, SessionStatus};
