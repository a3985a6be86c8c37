//! User-facing flows.
//!
//! Each sub-module groups related operations by screen. All of them take
//! the shared [`AppState`](crate::state::AppState), validate input before
//! any remote call and return [`Result`](crate::error::Result).

pub mod auth;
pub mod chat;
pub mod checkout;
pub mod listings;
pub mod profile;
