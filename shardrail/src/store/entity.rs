//! Entity contract and key metadata.
//!
//! Routers never reflect over entity types. The key field, its kind and the
//! accessor are declared once, at router construction, through
//! [`EntityDescriptor`].

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, SpecError};

use super::value::{Value, ValueKind};

/// A managed relational entity.
///
/// `field` exposes scalar columns by name; association resolution and the
/// scroll comparator read through it.
pub trait Entity:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Stable name of the entity's collection (table).
    fn entity_name() -> &'static str;

    /// Scalar value of a named field, if the entity exposes it.
    fn field(&self, name: &str) -> Option<Value>;
}

/// Kind of identity field the descriptor declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// String key that also routes the entity to its shard.
    LookupKey,
    /// Entity's own id; routing uses a separate parent key.
    Id,
}

/// Identity metadata for one entity type, declared at router construction.
#[derive(Clone)]
pub struct EntityDescriptor<T> {
    key_field: String,
    kind: KeyKind,
    declared: ValueKind,
    accessor: Arc<dyn Fn(&T) -> Value + Send + Sync>,
}

impl<T: Entity> EntityDescriptor<T> {
    pub fn new(
        key_field: impl Into<String>,
        kind: KeyKind,
        declared: ValueKind,
        accessor: impl Fn(&T) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            key_field: key_field.into(),
            kind,
            declared,
            accessor: Arc::new(accessor),
        }
    }

    /// Descriptor for a string lookup key.
    pub fn lookup_key(
        key_field: impl Into<String>,
        accessor: impl Fn(&T) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self::new(key_field, KeyKind::LookupKey, ValueKind::Text, accessor)
    }

    /// Descriptor for an id field of any scalar kind.
    pub fn id(
        key_field: impl Into<String>,
        declared: ValueKind,
        accessor: impl Fn(&T) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self::new(key_field, KeyKind::Id, declared, accessor)
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    /// Declared kind must exist and, for lookup keys, be a string.
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.key_field.is_empty() {
            return Err(SpecError::MissingKeyField.into());
        }

        if self.kind == KeyKind::LookupKey && self.declared != ValueKind::Text {
            return Err(SpecError::NonStringLookupKey(self.key_field.clone()).into());
        }

        Ok(())
    }

    pub(crate) fn validate_lookup(&self) -> Result<(), Error> {
        self.validate()?;

        if self.kind != KeyKind::LookupKey {
            return Err(SpecError::NotLookupKeyed.into());
        }

        Ok(())
    }

    /// Routing key of an entity, stringified for id keys.
    pub(crate) fn key_of(&self, entity: &T) -> Result<String, Error> {
        let value = (self.accessor)(entity);

        match (self.kind, value) {
            (_, Value::Null) => Err(Error::invalid_argument("entity key is null")),
            (KeyKind::LookupKey, Value::Text(key)) => Ok(key),
            (KeyKind::LookupKey, _) => {
                Err(SpecError::NonStringLookupKey(self.key_field.clone()).into())
            }
            (KeyKind::Id, value) => Ok(value.to_string()),
        }
    }
}

impl<T> fmt::Debug for EntityDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("key_field", &self.key_field)
            .field("kind", &self.kind)
            .field("declared", &self.declared)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fixtures::Phone;

    #[test]
    fn test_lookup_key_descriptor() {
        let descriptor = EntityDescriptor::<Phone>::lookup_key("phone_number", |phone| {
            Value::text(&phone.phone_number)
        });
        descriptor.validate_lookup().unwrap();

        let phone = Phone {
            phone_number: "+15551234".into(),
            carrier: "acme".into(),
            active: true,
        };
        assert_eq!(descriptor.key_of(&phone).unwrap(), "+15551234");
    }

    #[test]
    fn test_non_string_lookup_key_rejected() {
        let descriptor =
            EntityDescriptor::<Phone>::new("phone_number", KeyKind::LookupKey, ValueKind::Int, |_| {
                Value::Int(7)
            });
        assert!(matches!(
            descriptor.validate_lookup(),
            Err(Error::Spec(SpecError::NonStringLookupKey(_)))
        ));
    }

    #[test]
    fn test_missing_key_field_rejected() {
        let descriptor = EntityDescriptor::<Phone>::lookup_key("", |_| Value::Null);
        assert!(matches!(
            descriptor.validate(),
            Err(Error::Spec(SpecError::MissingKeyField))
        ));
    }

    #[test]
    fn test_id_key_stringified() {
        let descriptor = EntityDescriptor::<Phone>::id("id", ValueKind::Int, |_| Value::Int(42));
        let phone = Phone {
            phone_number: "+15551234".into(),
            carrier: "acme".into(),
            active: true,
        };
        assert_eq!(descriptor.key_of(&phone).unwrap(), "42");
    }
}
