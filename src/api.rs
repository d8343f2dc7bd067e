//! Typed access to the backend endpoints the client itself depends on.
//!
//! Dashboard resources (mastery, classrooms, polls, attendance, badges) are
//! plain JSON and go through [`crate::client::Client::call`].

pub mod auth;

pub use auth::{AuthApi, LoginResponse};
