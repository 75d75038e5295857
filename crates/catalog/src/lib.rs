//! `buildvault-catalog`
//!
//! **Responsibility:** the catalog record model and the collaborator
//! contracts the cache and job subsystems consume.
//!
//! - `Build`, `Tag`, `FileData`: record model
//! - `BuildSource`: `lookup` / `load_full`, used by background jobs
//! - `BuildRepository` + `InMemoryBuildRepository`: record storage for tests/dev
//! - `BuildCatalog`: cache-backed reads and writes over a repository

pub mod model;
pub mod repository;
pub mod service;

pub use model::{Build, BuildRef, FileData, Tag, AUTHOR, BUILD, COLOR, THEME};
pub use repository::{BuildRepository, BuildSource, DataError, InMemoryBuildRepository};
pub use service::BuildCatalog;
