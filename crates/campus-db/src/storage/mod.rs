pub mod collection;
pub mod hooks;
pub mod memory;
pub mod traits;

pub use collection::{CollectionDef, FieldKind};
pub use hooks::{CollectionView, WriteHook};
pub use memory::{MemoryStore, StoreOptions};
pub use traits::DocumentStore;
