//! Declarative child-query construction from parent values.

use serde::{Deserialize, Serialize};

use crate::error::{Error, SpecError};
use crate::store::{Criterion, Entity, Filter, QuerySpec, Selection};

/// Binds a parent field to the child column holding the same value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationSpec {
    pub parent_field: String,
    pub child_field: String,
}

impl AssociationSpec {
    pub fn new(parent_field: impl Into<String>, child_field: impl Into<String>) -> Self {
        Self {
            parent_field: parent_field.into(),
            child_field: child_field.into(),
        }
    }
}

/// How an augmenter selects child rows: an explicit criterion, a query
/// spec, or associations resolved against the parent instance.
#[derive(Debug, Clone)]
pub enum QueryFilterSpec {
    Criterion(Criterion),
    Spec(QuerySpec),
    Associations(Vec<AssociationSpec>),
}

impl QueryFilterSpec {
    /// Association list; must be non-empty.
    pub fn associations(specs: Vec<AssociationSpec>) -> Result<Self, Error> {
        if specs.is_empty() {
            return Err(Error::invalid_argument("association list is empty"));
        }

        Ok(QueryFilterSpec::Associations(specs))
    }

    /// Single-association convenience.
    pub fn association(spec: AssociationSpec) -> Self {
        QueryFilterSpec::Associations(vec![spec])
    }

    /// Resolve into the child selection for one parent instance.
    pub(crate) fn resolve<P: Entity>(&self, parent: &P) -> Result<Selection, Error> {
        match self {
            QueryFilterSpec::Criterion(criterion) => Ok(Selection::new(criterion.clone())),
            QueryFilterSpec::Spec(spec) => Ok(Filter::Spec(spec.clone()).resolve()),
            QueryFilterSpec::Associations(specs) => {
                let mut parts = Vec::with_capacity(specs.len());
                for spec in specs {
                    let value = parent.field(&spec.parent_field).ok_or_else(|| {
                        SpecError::MissingParentField(spec.parent_field.clone())
                    })?;
                    parts.push(Criterion::Eq(spec.child_field.clone(), value));
                }

                Ok(Selection::new(match parts.len() {
                    1 => parts.remove(0),
                    _ => Criterion::And(parts),
                }))
            }
        }
    }
}

impl From<Criterion> for QueryFilterSpec {
    fn from(criterion: Criterion) -> Self {
        QueryFilterSpec::Criterion(criterion)
    }
}

impl From<QuerySpec> for QueryFilterSpec {
    fn from(spec: QuerySpec) -> Self {
        QueryFilterSpec::Spec(spec)
    }
}

impl From<AssociationSpec> for QueryFilterSpec {
    fn from(spec: AssociationSpec) -> Self {
        QueryFilterSpec::association(spec)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fixtures::Company;
    use crate::store::Value;

    fn company() -> Company {
        Company {
            company_key: "acme".into(),
            company_usage_id: 17,
            name: "Acme".into(),
        }
    }

    #[test]
    fn test_association_resolves_parent_value() {
        let spec = QueryFilterSpec::association(AssociationSpec::new(
            "company_usage_id",
            "company_ext_id",
        ));

        let selection = spec.resolve(&company()).unwrap();
        assert_eq!(
            selection.criterion,
            Criterion::Eq("company_ext_id".into(), Value::Int(17))
        );
    }

    #[test]
    fn test_missing_parent_field() {
        let spec = QueryFilterSpec::association(AssociationSpec::new("nope", "child"));

        assert!(matches!(
            spec.resolve(&company()),
            Err(Error::Spec(SpecError::MissingParentField(_)))
        ));
    }

    #[test]
    fn test_empty_association_list_rejected() {
        assert!(QueryFilterSpec::associations(vec![]).is_err());
    }

    #[test]
    fn test_multi_association_ands() {
        let spec = QueryFilterSpec::associations(vec![
            AssociationSpec::new("company_usage_id", "company_ext_id"),
            AssociationSpec::new("company_key", "parent_key"),
        ])
        .unwrap();

        let selection = spec.resolve(&company()).unwrap();
        match selection.criterion {
            Criterion::And(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected And, got {:?}", other),
        }
    }
}
