pub mod config;
pub mod error;

pub mod modules;
pub mod query;
pub mod reference;
pub mod storage;

pub use config::QueryOptions;
pub use error::{CampusError, Result};
pub use query::{ListResult, PaginationMeta, QueryBuilder, QueryParams};
pub use reference::{CanonicalTable, ReferenceHook, ReferenceValidator};
pub use storage::{DocumentStore, MemoryStore};
