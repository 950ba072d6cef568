//! FNV-based bucket assignment with a fixed bucket → shard table.

use std::hash::Hasher;

use fnv::FnvHasher;

use crate::error::{Error, SpecError};

use super::ShardAssignment;

pub const DEFAULT_BUCKETS: usize = 1024;

/// Hashes the key into a fixed bucket space, then maps buckets to shards
/// through a table frozen at construction. The table is what keeps the
/// assignment stable: rebalancing would mean building a new table, which
/// is out of scope here.
#[derive(Debug, Clone)]
pub struct BucketAssignment {
    table: Vec<usize>,
}

impl BucketAssignment {
    /// Contiguous bucket ranges split evenly across `shards`.
    pub fn uniform(shards: usize) -> Result<Self, Error> {
        Self::with_buckets(shards, DEFAULT_BUCKETS)
    }

    pub fn with_buckets(shards: usize, buckets: usize) -> Result<Self, Error> {
        if shards == 0 {
            return Err(Error::invalid_argument("shard count must be positive"));
        }

        if buckets < shards {
            return Err(Error::invalid_argument(
                "bucket count must be at least the shard count",
            ));
        }

        let table = (0..buckets).map(|bucket| bucket * shards / buckets).collect();

        Ok(Self { table })
    }

    /// Custom bucket → shard table. Every entry must address a shard
    /// inside the fleet.
    pub fn with_table(table: Vec<usize>, shards: usize) -> Result<Self, Error> {
        if table.is_empty() {
            return Err(Error::invalid_argument("bucket table is empty"));
        }

        for shard in &table {
            if *shard >= shards {
                return Err(SpecError::ShardOutOfRange {
                    shard: *shard,
                    shards,
                }
                .into());
            }
        }

        Ok(Self { table })
    }

    pub fn buckets(&self) -> usize {
        self.table.len()
    }

    fn bucket(&self, key: &str) -> usize {
        let mut hasher = FnvHasher::default();
        hasher.write(key.as_bytes());
        (hasher.finish() % self.table.len() as u64) as usize
    }
}

impl ShardAssignment for BucketAssignment {
    fn shard(&self, key: &str) -> usize {
        self.table[self.bucket(key)]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_stable() {
        let assignment = BucketAssignment::uniform(4).unwrap();

        for key in ["+15551234", "a", "", "company-17"] {
            let shard = assignment.shard(key);
            for _ in 0..100 {
                assert_eq!(assignment.shard(key), shard);
            }
        }
    }

    #[test]
    fn test_all_shards_reachable() {
        let shards = 8;
        let assignment = BucketAssignment::uniform(shards).unwrap();

        let mut seen = vec![false; shards];
        for i in 0..10_000 {
            seen[assignment.shard(&format!("key-{}", i))] = true;
        }

        assert!(seen.iter().all(|hit| *hit));
    }

    #[test]
    fn test_in_range() {
        let shards = 3;
        let assignment = BucketAssignment::uniform(shards).unwrap();

        for i in 0..10_000 {
            assert!(assignment.shard(&format!("key-{}", i)) < shards);
        }
    }

    #[test]
    fn test_table_validation() {
        assert!(BucketAssignment::uniform(0).is_err());
        assert!(BucketAssignment::with_buckets(4, 2).is_err());
        assert!(BucketAssignment::with_table(vec![0, 1, 2], 2).is_err());
        assert!(BucketAssignment::with_table(vec![0, 1, 1, 0], 2).is_ok());
    }
}
