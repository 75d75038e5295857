//! `buildvault-core`: identifiers and the domain error model.
//!
//! Pure types only: no I/O and no shared state.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{BuildId, TaskId};
