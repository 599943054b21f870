//! Core library for newsdesk, the admin dashboard client of the news site.
//!
//! Owns the client-side session lifecycle: acquiring a token at login,
//! persisting it with the user snapshot, verifying it with the server at
//! startup, and gating dashboard routes on the resulting session state.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod router;

pub use api::{ApiClient, ApiError, AuthApi};
pub use auth::{
    CredentialRecord, CredentialStore, LoginError, SessionManager, SessionState, SessionStatus,
};
pub use config::{Config, CredentialBackend};
pub use models::{Role, UserProfile};
pub use router::{GuardOutcome, Layout, Route, RouteGuard};
