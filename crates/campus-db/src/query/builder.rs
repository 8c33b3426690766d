//! `QueryBuilder`: translates a list request's raw query parameters into a
//! searched, filtered, sorted, paginated and projected [`Query`], plus
//! pagination metadata from an independent count.
//!
//! ```text
//! QueryBuilder::new(base, params)
//!     .search(&["name", "shortForm"])
//!     .filter()
//!     .sort()
//!     .paginate()
//!     .fields()
//!     .exec_with_meta(&store, "academicDepartments")
//! ```
//!
//! The builder never fails: malformed or missing control parameters fall back
//! to [`QueryOptions`] defaults. Only store I/O can return an error.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::QueryOptions;
use crate::error::Result;
use crate::storage::traits::DocumentStore;

use super::params::{ParamValue, QueryParams};
use super::types::{and_filters, parse_sort_spec, Projection, Query, SortEntry};

// ============================================================================
// Result Types
// ============================================================================

/// Pagination metadata returned next to a result page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_page: usize,
}

impl PaginationMeta {
    /// Build metadata for `total` matches. `limit: None` means the whole match
    /// set is a single page.
    pub fn new(page: usize, limit: Option<usize>, total: usize) -> Self {
        match limit {
            Some(limit) => Self {
                page,
                limit,
                total,
                total_page: total.div_ceil(limit),
            },
            None => Self {
                page: 1,
                limit: total,
                total,
                total_page: usize::from(total > 0),
            },
        }
    }
}

/// A result page with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResult<T = Value> {
    pub meta: PaginationMeta,
    pub result: Vec<T>,
}

// ============================================================================
// QueryBuilder
// ============================================================================

/// Chainable translator from [`QueryParams`] to a [`Query`].
///
/// Search and filter conditions are kept apart from the page-shaping state
/// (sort, window, projection) so [`count_total`](Self::count_total) can count
/// the full match set regardless of what the page query does.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    base: Query,
    params: QueryParams,
    options: QueryOptions,
    search: Option<Value>,
    conditions: Option<Value>,
    sort: Option<Vec<SortEntry>>,
    window: Option<(usize, Option<usize>)>,
    projection: Option<Projection>,
}

impl QueryBuilder {
    /// Start from an already-scoped `base` query (pre-filter, populate).
    pub fn new(base: Query, params: QueryParams) -> Self {
        Self::with_options(base, params, QueryOptions::default())
    }

    pub fn with_options(base: Query, params: QueryParams, options: QueryOptions) -> Self {
        Self {
            base,
            params,
            options,
            search: None,
            conditions: None,
            sort: None,
            window: None,
            projection: None,
        }
    }

    // -----------------------------------------------------------------------
    // Pipeline stages
    // -----------------------------------------------------------------------

    /// Add an OR group of case-insensitive substring matches of `searchTerm`,
    /// one per field. No-op without a term or without fields.
    pub fn search(mut self, fields: &[&str]) -> Self {
        let term = match self.params.get_str("searchTerm") {
            Some(t) if !fields.is_empty() => t,
            _ => return self,
        };
        let pattern = regex::escape(term);
        let clauses: Vec<Value> = fields
            .iter()
            .map(|field| {
                let mut clause = Map::new();
                clause.insert(
                    (*field).to_string(),
                    json!({ "$regex": pattern, "$options": "i" }),
                );
                Value::Object(clause)
            })
            .collect();
        self.search = Some(json!({ "$or": clauses }));
        self
    }

    /// Turn every non-reserved parameter into an exact-match condition;
    /// repeated parameters become an any-of match.
    pub fn filter(mut self) -> Self {
        let conditions: Map<String, Value> = self
            .params
            .filter_entries()
            .map(|(key, value)| {
                let condition = match value {
                    ParamValue::One(v) => Value::String(v.clone()),
                    ParamValue::Many(vs) => json!({ "$in": vs }),
                };
                (key.clone(), condition)
            })
            .collect();
        self.conditions = (!conditions.is_empty()).then_some(Value::Object(conditions));
        self
    }

    /// Order by the `sort` parameter, or by the configured default.
    pub fn sort(mut self) -> Self {
        let requested = self
            .params
            .get("sort")
            .map(|v| parse_sort_spec(&v.joined()))
            .unwrap_or_default();
        self.sort = Some(if requested.is_empty() {
            parse_sort_spec(&self.options.default_sort)
        } else {
            requested
        });
        self
    }

    /// Window the page query to `skip = (page - 1) * limit`, `limit`.
    pub fn paginate(mut self) -> Self {
        self.window = Some((self.page(), self.limit()));
        self
    }

    /// Project to the `fields` parameter; no projection when absent.
    pub fn fields(mut self) -> Self {
        self.projection = self
            .params
            .get("fields")
            .and_then(|v| Projection::parse(&v.joined()));
        self
    }

    // -----------------------------------------------------------------------
    // Parsed control parameters
    // -----------------------------------------------------------------------

    /// Requested page, or the default when missing / not a positive integer.
    /// Always 1 when the page size is unbounded.
    pub fn page(&self) -> usize {
        if self.limit().is_none() {
            return 1;
        }
        positive(self.params.get_str("page")).unwrap_or(self.options.default_page.max(1))
    }

    /// Requested page size (clamped to `max_limit`), or the default. `None`
    /// only when no valid `limit` was sent and the default is unbounded.
    pub fn limit(&self) -> Option<usize> {
        let requested = positive(self.params.get_str("limit"));
        let limit = requested.or(self.options.default_limit.filter(|l| *l > 0))?;
        Some(match self.options.max_limit {
            Some(max) if max > 0 => limit.min(max),
            _ => limit,
        })
    }

    /// The skip offset the page query will use.
    pub fn offset(&self) -> usize {
        match self.window {
            Some((page, Some(limit))) => (page - 1).saturating_mul(limit),
            _ => 0,
        }
    }

    // -----------------------------------------------------------------------
    // Output
    // -----------------------------------------------------------------------

    /// Base, search and filter conditions ANDed together: the match set both
    /// the page query and the count use.
    pub fn conditions(&self) -> Option<Value> {
        and_filters(
            [
                self.base.filter.clone(),
                self.search.clone(),
                self.conditions.clone(),
            ]
            .into_iter()
            .flatten(),
        )
    }

    /// The composed page query. Stages that were not applied leave the base
    /// query's corresponding setting in place.
    pub fn query(&self) -> Query {
        let (limit, offset) = match self.window {
            Some((_, limit)) => (limit, Some(self.offset())),
            None => (self.base.limit, self.base.offset),
        };
        Query {
            filter: self.conditions(),
            sort: self.sort.clone().or_else(|| self.base.sort.clone()),
            limit,
            offset,
            projection: self
                .projection
                .clone()
                .or_else(|| self.base.projection.clone()),
            populate: self.base.populate.clone(),
        }
    }

    /// Consume the builder, returning the composed page query.
    pub fn into_query(self) -> Query {
        self.query()
    }

    /// Run the page query.
    pub fn exec<S: DocumentStore + ?Sized>(&self, store: &S, collection: &str) -> Result<Vec<Value>> {
        store.find(collection, &self.query())
    }

    /// Count the full match set and derive pagination metadata. Independent
    /// of sort, window and projection.
    pub fn count_total<S: DocumentStore + ?Sized>(
        &self,
        store: &S,
        collection: &str,
    ) -> Result<PaginationMeta> {
        let total = store.count(collection, self.conditions().as_ref())?;
        Ok(PaginationMeta::new(self.page(), self.limit(), total))
    }

    /// Run the page query and the count.
    pub fn exec_with_meta<S: DocumentStore + ?Sized>(
        &self,
        store: &S,
        collection: &str,
    ) -> Result<ListResult> {
        let result = self.exec(store, collection)?;
        let meta = self.count_total(store, collection)?;
        Ok(ListResult { meta, result })
    }
}

fn positive(raw: Option<&str>) -> Option<usize> {
    raw.and_then(|s| s.parse::<usize>().ok()).filter(|n| *n > 0)
}

// ============================================================================
// Tests
// ============================================================================
