//! Route gating for the admin dashboard.
//!
//! `Route` is the dashboard's route table; `RouteGuard` decides for each
//! navigation whether to show a placeholder, render the view, or redirect,
//! purely from the current session state.

pub mod guard;
pub mod route;

pub use guard::{evaluate, GuardOutcome, Layout, RouteGuard};
pub use route::{Access, Route};
