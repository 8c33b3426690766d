//! Reference consistency: enumerated names with derived short forms and
//! codes.
//!
//! - [`mapping`]: [`CanonicalTable`] and the [`ReferenceFields`] naming the
//!   triple on a document.
//! - [`validator`]: pure checks ([`ReferenceValidator`]) used by request
//!   validation, service autofill and the store hook.
//! - [`hook`]: [`ReferenceHook`], the pre-create / pre-update gate.

pub mod hook;
pub mod mapping;
pub mod validator;

pub use hook::ReferenceHook;
pub use mapping::{CanonicalEntry, CanonicalTable, ReferenceFields};
pub use validator::{PayloadMode, ReferenceTriple, ReferenceValidator};
