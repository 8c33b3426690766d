//! Academic-entity modules: collection definitions, payload validation and
//! service functions for faculties, departments and students.

use std::sync::Arc;

use crate::error::Result;
use crate::storage::{CollectionDef, MemoryStore, StoreOptions};

pub mod department;
pub mod faculty;
pub mod student;

pub use department::DepartmentService;
pub use faculty::FacultyService;
pub use student::StudentService;

/// Every collection the modules use, with their hooks attached.
pub fn collections() -> Vec<Arc<CollectionDef>> {
    vec![
        Arc::new(faculty::collection_def()),
        Arc::new(department::collection_def()),
        Arc::new(student::collection_def()),
    ]
}

/// A [`MemoryStore`] initialized with [`collections`].
pub fn open_memory_store(options: StoreOptions) -> Result<Arc<MemoryStore>> {
    let mut store = MemoryStore::with_options(options);
    store.initialize(&collections())?;
    Ok(Arc::new(store))
}
