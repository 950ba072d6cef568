//! Query model: filters, specs, ordering and pagination.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, SpecError};

use super::criterion::Criterion;

/// Sort direction. Also orients scroll pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

/// One sort key applied by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: Direction,
}

impl SortKey {
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn ascending(field: impl Into<String>) -> Self {
        Self::new(field, Direction::Ascending)
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self::new(field, Direction::Descending)
    }
}

/// Offset pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub start: u64,
    pub rows: u64,
}

impl Page {
    pub fn new(start: u64, rows: u64) -> Result<Self, Error> {
        if rows == 0 {
            return Err(SpecError::InvalidBounds.into());
        }

        Ok(Self { start, rows })
    }
}

/// Accumulates a criterion and sort order while a [`QuerySpec`] runs.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    criterion: Option<Criterion>,
    order: Vec<SortKey>,
}

impl QueryBuilder {
    /// AND another criterion into the filter.
    pub fn filter(&mut self, criterion: Criterion) -> &mut Self {
        self.criterion = Some(match self.criterion.take() {
            Some(existing) => existing.and(criterion),
            None => criterion,
        });
        self
    }

    pub fn order_by(&mut self, field: impl Into<String>, direction: Direction) -> &mut Self {
        self.order.push(SortKey::new(field, direction));
        self
    }

    fn into_parts(self) -> (Criterion, Vec<SortKey>) {
        (self.criterion.unwrap_or(Criterion::All), self.order)
    }
}

/// A query built programmatically against a [`QueryBuilder`].
#[derive(Clone)]
pub struct QuerySpec(Arc<dyn Fn(&mut QueryBuilder) + Send + Sync>);

impl QuerySpec {
    pub fn new(spec: impl Fn(&mut QueryBuilder) + Send + Sync + 'static) -> Self {
        Self(Arc::new(spec))
    }

    pub(crate) fn build(&self) -> (Criterion, Vec<SortKey>) {
        let mut builder = QueryBuilder::default();
        (self.0)(&mut builder);
        builder.into_parts()
    }
}

impl fmt::Debug for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QuerySpec")
    }
}

/// Either a plain criterion or a programmatic query spec.
#[derive(Debug, Clone)]
pub enum Filter {
    Criterion(Criterion),
    Spec(QuerySpec),
}

impl Filter {
    /// Resolve into a concrete selection with no pagination.
    pub fn resolve(self) -> Selection {
        match self {
            Filter::Criterion(criterion) => Selection::new(criterion),
            Filter::Spec(spec) => {
                let (criterion, order) = spec.build();
                Selection {
                    criterion,
                    order,
                    page: None,
                }
            }
        }
    }
}

impl From<Criterion> for Filter {
    fn from(criterion: Criterion) -> Self {
        Filter::Criterion(criterion)
    }
}

impl From<QuerySpec> for Filter {
    fn from(spec: QuerySpec) -> Self {
        Filter::Spec(spec)
    }
}

/// Concrete query handed to a session: filter, order, pagination.
#[derive(Debug, Clone)]
pub struct Selection {
    pub criterion: Criterion,
    pub order: Vec<SortKey>,
    pub page: Option<Page>,
}

impl Selection {
    pub fn new(criterion: Criterion) -> Self {
        Self {
            criterion,
            order: Vec::new(),
            page: None,
        }
    }

    pub fn with_order(mut self, key: SortKey) -> Self {
        self.order.push(key);
        self
    }

    pub fn with_page(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::Value;

    #[test]
    fn test_zero_rows_rejected() {
        assert!(Page::new(0, 0).is_err());
        assert!(Page::new(10, 5).is_ok());
    }

    #[test]
    fn test_query_spec_builds_selection() {
        let spec = QuerySpec::new(|builder| {
            builder
                .filter(Criterion::eq("carrier", Value::text("acme")))
                .filter(Criterion::eq("active", true))
                .order_by("id", Direction::Descending);
        });

        let selection = Filter::from(spec).resolve();
        match &selection.criterion {
            Criterion::And(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected And, got {:?}", other),
        }
        assert_eq!(selection.order.len(), 1);
        assert_eq!(selection.order[0].direction, Direction::Descending);
    }

    #[test]
    fn test_empty_spec_matches_all() {
        let spec = QuerySpec::new(|_| {});
        let selection = Filter::from(spec).resolve();
        assert_eq!(selection.criterion, Criterion::All);
    }
}
