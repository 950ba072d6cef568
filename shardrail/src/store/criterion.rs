//! Cloneable filter algebra interpreted by session engines.
//!
//! Criteria are plain data: they clone across shards (the scroll engine
//! copies one per shard on every step) and serialize for diagnostics. The
//! library evaluates them in memory for the reference engine; SQL engines
//! translate them to WHERE clauses.

use serde::{Deserialize, Serialize};

use super::entity::Entity;
use super::value::Value;

/// Declarative row filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Criterion {
    /// Matches every row.
    All,
    Eq(String, Value),
    Ne(String, Value),
    Gt(String, Value),
    Ge(String, Value),
    Lt(String, Value),
    Le(String, Value),
    In(String, Vec<Value>),
    And(Vec<Criterion>),
    Or(Vec<Criterion>),
    Not(Box<Criterion>),
}

impl Criterion {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Criterion::Eq(field.into(), value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Criterion::Ne(field.into(), value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Criterion::Gt(field.into(), value.into())
    }

    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Criterion::Ge(field.into(), value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Criterion::Lt(field.into(), value.into())
    }

    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Criterion::Le(field.into(), value.into())
    }

    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Criterion::In(field.into(), values)
    }

    /// Conjunction, flattening nested `And` nodes.
    pub fn and(self, other: Criterion) -> Self {
        match (self, other) {
            (Criterion::All, other) => other,
            (this, Criterion::All) => this,
            (Criterion::And(mut parts), Criterion::And(others)) => {
                parts.extend(others);
                Criterion::And(parts)
            }
            (Criterion::And(mut parts), other) => {
                parts.push(other);
                Criterion::And(parts)
            }
            (this, other) => Criterion::And(vec![this, other]),
        }
    }

    pub fn or(self, other: Criterion) -> Self {
        match (self, other) {
            (Criterion::Or(mut parts), other) => {
                parts.push(other);
                Criterion::Or(parts)
            }
            (this, other) => Criterion::Or(vec![this, other]),
        }
    }

    pub fn negate(self) -> Self {
        Criterion::Not(Box::new(self))
    }

    /// Evaluate against an entity. Fields the entity does not expose
    /// read as null.
    pub fn matches<E: Entity>(&self, entity: &E) -> bool {
        use std::cmp::Ordering::*;

        let field = |name: &str| entity.field(name).unwrap_or(Value::Null);

        match self {
            Criterion::All => true,
            Criterion::Eq(name, value) => field(name) == *value,
            Criterion::Ne(name, value) => field(name) != *value,
            Criterion::Gt(name, value) => {
                matches!(field(name).try_cmp(value), Some(Greater))
            }
            Criterion::Ge(name, value) => {
                matches!(field(name).try_cmp(value), Some(Greater | Equal))
            }
            Criterion::Lt(name, value) => matches!(field(name).try_cmp(value), Some(Less)),
            Criterion::Le(name, value) => {
                matches!(field(name).try_cmp(value), Some(Less | Equal))
            }
            Criterion::In(name, values) => {
                let actual = field(name);
                values.iter().any(|value| actual == *value)
            }
            Criterion::And(parts) => parts.iter().all(|part| part.matches(entity)),
            Criterion::Or(parts) => parts.iter().any(|part| part.matches(entity)),
            Criterion::Not(part) => !part.matches(entity),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fixtures::Phone;

    fn phone() -> Phone {
        Phone {
            phone_number: "+15551234".into(),
            carrier: "acme".into(),
            active: true,
        }
    }

    #[test]
    fn test_matches() {
        let row = phone();

        assert!(Criterion::eq("phone_number", "+15551234").matches(&row));
        assert!(!Criterion::eq("phone_number", "+15550000").matches(&row));
        assert!(Criterion::eq("carrier", "acme")
            .and(Criterion::eq("active", true))
            .matches(&row));
        assert!(Criterion::is_in(
            "phone_number",
            vec!["+15550000".into(), "+15551234".into()]
        )
        .matches(&row));
        assert!(Criterion::eq("carrier", "other").negate().matches(&row));
        // Unknown fields read as null.
        assert!(!Criterion::eq("missing", 1i64).matches(&row));
    }

    #[test]
    fn test_and_flattens() {
        let criterion = Criterion::eq("a", 1i64)
            .and(Criterion::eq("b", 2i64))
            .and(Criterion::eq("c", 3i64));

        match criterion {
            Criterion::And(parts) => assert_eq!(parts.len(), 3),
            other => panic!("expected And, got {:?}", other),
        }
    }

    #[test]
    fn test_all_identity() {
        let criterion = Criterion::All.and(Criterion::eq("a", 1i64));
        assert_eq!(criterion, Criterion::eq("a", 1i64));
    }
}
