//! Remote identity service access.
//!
//! This module provides the `AuthApi` trait describing the three calls the
//! session core makes (login, session check, logout) and `ApiClient`, its
//! HTTP implementation against the content API.
//!
//! The API uses opaque bearer tokens issued by the login endpoint.

pub mod backend;
pub mod client;
pub mod error;

pub use backend::{AuthApi, LoginResponse, SessionCheck};
pub use client::ApiClient;
pub use error::ApiError;
