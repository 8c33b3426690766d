//! Canonical mapping tables: a closed set of names, each with its derived
//! short form and numeric code.

use std::sync::Arc;

/// Derived values for one canonical name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalEntry {
    pub short_form: String,
    pub code: String,
}

/// Closed `name → (short form, code)` table, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalTable {
    /// Human-readable entity label used in error messages ("department").
    entity: String,
    entries: Vec<(String, CanonicalEntry)>,
}

impl CanonicalTable {
    /// Build a table from `(name, short form, code)` rows.
    ///
    /// Panics if a name, short form or code repeats: derived values must be
    /// a bijection over the names.
    pub fn new<'a>(
        entity: impl Into<String>,
        rows: impl IntoIterator<Item = (&'a str, &'a str, &'a str)>,
    ) -> Self {
        let mut entries: Vec<(String, CanonicalEntry)> = Vec::new();
        for (name, short_form, code) in rows {
            assert!(
                !entries.iter().any(|(n, e)| n == name
                    || e.short_form == short_form
                    || e.code == code),
                "duplicate canonical row for {name}"
            );
            entries.push((
                name.to_string(),
                CanonicalEntry {
                    short_form: short_form.to_string(),
                    code: code.to_string(),
                },
            ));
        }
        Self {
            entity: entity.into(),
            entries,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn get(&self, name: &str) -> Option<&CanonicalEntry> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, e)| e)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn short_forms(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, e)| e.short_form.as_str())
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, e)| e.code.as_str())
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

/// Document field names holding the canonical triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceFields {
    pub name: String,
    pub short_form: String,
    pub code: String,
}

impl ReferenceFields {
    pub fn new(
        name: impl Into<String>,
        short_form: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            short_form: short_form.into(),
            code: code.into(),
        }
    }
}

impl Default for ReferenceFields {
    fn default() -> Self {
        Self::new("name", "shortForm", "code")
    }
}
