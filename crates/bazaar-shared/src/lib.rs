//! # bazaar-shared
//!
//! Domain types shared by the Bazaar store and client crates: marketplace
//! models, identifiers, the remote table query model, catalog filtering and
//! form validation.

pub mod catalog;
pub mod constants;
pub mod error;
pub mod models;
pub mod query;
pub mod types;
pub mod validation;

pub use error::{QueryError, ValidationError};
pub use models::*;
pub use types::{MessageId, ProductId, Table, UserId};
