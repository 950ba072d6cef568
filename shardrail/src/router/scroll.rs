//! Cross-shard ordered iteration with per-shard offset pointers.
//!
//! Each step asks every shard for `page_size` rows starting at that
//! shard's consumed offset, merges by sort-field value with shard index
//! as the tie-break, keeps the first `page_size`, and advances exactly
//! the shards those rows came from. With a strictly monotonic sort
//! field, every matching row is returned exactly once across the full
//! sequence of calls.

use std::cmp::Ordering;

use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde::{Deserialize, Serialize};

use crate::error::{Error, SpecError};
use crate::fleet::Fleet;
use crate::ops;
use crate::ops::Operation;
use crate::store::{
    Criterion, Direction, Entity, LockMode, Page, Selection, SessionGateway, SortKey, Value,
};
use crate::txn::{self, TxMode};

/// Resumable position of a cross-shard scroll: a direction and, per
/// shard, the number of rows already consumed.
///
/// Pointers are one-shot per direction; feeding an ascending pointer to
/// a descending scroll is an error. The library only ever mutates the
/// copy it returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollPointer {
    direction: Direction,
    offsets: Vec<u64>,
}

impl ScrollPointer {
    /// Fresh pointer with every shard at offset zero.
    pub fn new(direction: Direction, shards: usize) -> Self {
        Self {
            direction,
            offsets: vec![0; shards],
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn offset(&self, shard: usize) -> u64 {
        self.offsets[shard]
    }

    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    fn advance(&mut self, shard: usize) {
        self.offsets[shard] += 1;
    }

    /// Opaque wire form for cursor-pagination APIs: MessagePack inside
    /// base64.
    pub fn encode(&self) -> Result<String, Error> {
        let bytes = rmp_serde::to_vec(self).map_err(Error::operation_failed)?;
        Ok(BASE64_STANDARD.encode(bytes))
    }

    pub fn decode(token: &str) -> Result<Self, Error> {
        let bytes = BASE64_STANDARD
            .decode(token)
            .map_err(|_| Error::invalid_argument("scroll token is not valid base64"))?;

        rmp_serde::from_slice(&bytes)
            .map_err(|_| Error::invalid_argument("scroll token is malformed"))
    }
}

/// One scroll step: the advanced pointer and at most `page_size` rows.
#[derive(Debug, Clone)]
pub struct ScrollResult<T> {
    pub pointer: ScrollPointer,
    pub items: Vec<T>,
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn step<T, G>(
    fleet: &Fleet<G>,
    router: &'static str,
    command: &'static str,
    criterion: Criterion,
    pointer: Option<ScrollPointer>,
    page_size: usize,
    sort_field: &str,
    direction: Direction,
) -> Result<ScrollResult<T>, Error>
where
    T: Entity,
    G: SessionGateway,
{
    if page_size == 0 {
        return Err(Error::invalid_argument("page size must be positive"));
    }

    if let Some(max) = fleet.config().scroll.max_page_size {
        if page_size > max {
            return Err(Error::invalid_argument(format!(
                "page size {} exceeds the configured maximum of {}",
                page_size, max,
            )));
        }
    }

    let shards = fleet.shards();

    let mut pointer = match pointer {
        Some(pointer) => {
            if pointer.direction != direction {
                return Err(SpecError::PointerDirection.into());
            }
            if pointer.offsets.len() != shards {
                return Err(SpecError::PointerWidth {
                    pointer: pointer.offsets.len(),
                    fleet: shards,
                }
                .into());
            }
            pointer
        }
        None => ScrollPointer::new(direction, shards),
    };

    let mut merged: Vec<(Value, usize, T)> = Vec::new();

    for shard in 0..shards {
        let selection = Selection::new(criterion.clone())
            .with_order(SortKey::new(sort_field, direction))
            .with_page(Page {
                start: pointer.offset(shard),
                rows: page_size as u64,
            });

        let op = ops::Select::<T>::new(selection, LockMode::None);
        let record = fleet.record::<T>(router, command, Operation::<G::Session>::kind(&op), shard);

        let rows = txn::execute(
            fleet.gateway(shard),
            fleet.observers(),
            record,
            TxMode::ReadOnly,
            op,
        )
        .await?;

        for row in rows {
            let value = row
                .field(sort_field)
                .ok_or_else(|| SpecError::MissingSortField(sort_field.to_string()))?;
            merged.push((value, shard, row));
        }
    }

    merged.sort_by(|a, b| {
        let by_value = a.0.try_cmp(&b.0).unwrap_or(Ordering::Equal);
        let by_value = match direction {
            Direction::Ascending => by_value,
            Direction::Descending => by_value.reverse(),
        };

        by_value.then(a.1.cmp(&b.1))
    });

    let mut items = Vec::new();
    for (_, shard, row) in merged.into_iter().take(page_size) {
        pointer.advance(shard);
        items.push(row);
    }

    Ok(ScrollResult { pointer, items })
}

#[cfg(test)]
mod test {
    use base64::prelude::{Engine as _, BASE64_STANDARD};

    use super::*;

    #[test]
    fn test_pointer_roundtrip() {
        let mut pointer = ScrollPointer::new(Direction::Ascending, 4);
        pointer.advance(1);
        pointer.advance(1);
        pointer.advance(3);

        let token = pointer.encode().unwrap();
        let decoded = ScrollPointer::decode(&token).unwrap();

        assert_eq!(decoded, pointer);
        assert_eq!(decoded.offsets(), &[0, 2, 0, 1]);
    }

    #[test]
    fn test_bad_tokens() {
        assert!(ScrollPointer::decode("not base64 !!!").is_err());
        assert!(ScrollPointer::decode(&BASE64_STANDARD.encode(b"junk")).is_err());
    }
}
