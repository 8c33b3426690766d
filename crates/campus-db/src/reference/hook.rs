//! `ReferenceHook`: runs the reference checks on a collection's write path.

use serde_json::{Map, Value};

use crate::error::{ReferenceError, Result};
use crate::storage::hooks::{CollectionView, WriteHook};

use super::validator::{ReferenceTriple, ReferenceValidator};

/// Store hook enforcing the canonical mapping on create and update.
///
/// - pre-create: mapping check, then duplicate-name check.
/// - pre-update: the target must exist, then the effective values must pass
///   the mapping check.
#[derive(Debug, Clone)]
pub struct ReferenceHook {
    validator: ReferenceValidator,
}

impl ReferenceHook {
    pub fn new(validator: ReferenceValidator) -> Self {
        Self { validator }
    }

    pub fn validator(&self) -> &ReferenceValidator {
        &self.validator
    }

    fn entity(&self) -> String {
        self.validator.table().entity().to_string()
    }
}

impl WriteHook for ReferenceHook {
    fn pre_create(&self, view: &CollectionView<'_>, doc: &Value) -> Result<()> {
        self.validator.check_create(doc)?;

        let fields = self.validator.fields();
        let name = ReferenceTriple::from_doc(doc, fields)
            .name
            .unwrap_or_default();
        let mut by_name = Map::new();
        by_name.insert(fields.name.clone(), Value::String(name.clone()));
        if view.exists(&Value::Object(by_name))? {
            return Err(ReferenceError::DuplicateEntity {
                entity: self.entity(),
                name,
            }
            .into());
        }
        Ok(())
    }

    fn pre_update(&self, view: &CollectionView<'_>, filter: &Value, update: &Value) -> Result<()> {
        let existing = view
            .find_one(filter)?
            .ok_or_else(|| ReferenceError::NotFound {
                entity: self.entity(),
            })?;
        self.validator.check_update(existing, update)?;
        Ok(())
    }
}
