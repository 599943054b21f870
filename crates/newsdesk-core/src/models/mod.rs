//! Data models shared by the session core.
//!
//! - `UserProfile`: the account snapshot cached with the session token
//! - `Role`: dashboard permission level reported by the content API

pub mod user;

pub use user::{Role, UserProfile};
