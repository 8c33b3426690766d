//! Query layer: document filter primitives and the list-request translator.
//!
//! - [`operators`]: filter evaluation (`$eq`, `$in`, `$or`, `$regex`, ...).
//! - [`execute`]: sort, window, projection and count over a document slice.
//! - [`types`]: [`Query`](types::Query) and its parts.
//! - [`params`]: raw request parameters.
//! - [`builder`]: [`QueryBuilder`](builder::QueryBuilder).

pub mod builder;
pub mod execute;
pub mod operators;
pub mod params;
pub mod types;

pub use builder::{ListResult, PaginationMeta, QueryBuilder};
pub use params::{ParamValue, QueryParams, RESERVED_KEYS};
pub use types::{Projection, Query, SortDirection, SortEntry};
