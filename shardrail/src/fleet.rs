//! A fixed fleet of shard gateways.

use std::sync::Arc;

use shardrail_config::Config;

use crate::error::{Error, SpecError};
use crate::observer::{Observer, ObserverChain, ObserverContext};
use crate::ops::OpKind;
use crate::sharding::{BucketAssignment, ShardAssignment};
use crate::store::{Entity, SessionGateway};

/// The configured shard fleet: one gateway per shard, the key
/// assignment, the observer chain and the config. Constructed once,
/// shared by every router through `Arc`, immutable afterwards.
pub struct Fleet<G: SessionGateway> {
    gateways: Vec<G>,
    assignment: Arc<dyn ShardAssignment>,
    observers: ObserverChain,
    config: Config,
}

impl<G: SessionGateway> std::fmt::Debug for Fleet<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fleet")
            .field("shards", &self.gateways.len())
            .finish()
    }
}

impl<G: SessionGateway> Fleet<G> {
    pub fn builder() -> FleetBuilder<G> {
        FleetBuilder {
            gateways: Vec::new(),
            assignment: None,
            observers: ObserverChain::new(),
            config: Config::default(),
        }
    }

    pub fn shards(&self) -> usize {
        self.gateways.len()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn gateway(&self, shard: usize) -> &G {
        &self.gateways[shard]
    }

    pub(crate) fn observers(&self) -> &ObserverChain {
        &self.observers
    }

    /// Shard holding a routing key.
    pub fn shard_for(&self, key: &str) -> Result<usize, Error> {
        if key.is_empty() {
            return Err(Error::invalid_argument("routing key is empty"));
        }

        let shard = self.assignment.shard(key);
        if shard >= self.gateways.len() {
            return Err(SpecError::ShardOutOfRange {
                shard,
                shards: self.gateways.len(),
            }
            .into());
        }

        Ok(shard)
    }

    pub(crate) fn record<T: Entity>(
        &self,
        router: &'static str,
        command: &'static str,
        kind: OpKind,
        shard: usize,
    ) -> ObserverContext {
        ObserverContext {
            command,
            kind,
            entity: T::entity_name(),
            router,
            shard,
            shard_name: self.gateways[shard].shard_name().to_string(),
        }
    }
}

/// Validating builder for [`Fleet`].
pub struct FleetBuilder<G> {
    gateways: Vec<G>,
    assignment: Option<Arc<dyn ShardAssignment>>,
    observers: ObserverChain,
    config: Config,
}

impl<G: SessionGateway> FleetBuilder<G> {
    pub fn gateway(mut self, gateway: G) -> Self {
        self.gateways.push(gateway);
        self
    }

    pub fn gateways(mut self, gateways: impl IntoIterator<Item = G>) -> Self {
        self.gateways.extend(gateways);
        self
    }

    pub fn assignment(mut self, assignment: impl ShardAssignment) -> Self {
        self.assignment = Some(Arc::new(assignment));
        self
    }

    pub fn observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Arc<Fleet<G>>, Error> {
        if self.gateways.is_empty() {
            return Err(Error::invalid_argument(
                "fleet requires at least one shard gateway",
            ));
        }

        let assignment = match self.assignment {
            Some(assignment) => assignment,
            None => Arc::new(BucketAssignment::with_buckets(
                self.gateways.len(),
                self.config.general.buckets,
            )?),
        };

        Ok(Arc::new(Fleet {
            gateways: self.gateways,
            assignment,
            observers: self.observers,
            config: self.config,
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mem::{MemGateway, MemStore};

    #[test]
    fn test_empty_fleet_rejected() {
        let err = Fleet::<MemGateway>::builder().build().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_routing_is_stable_and_in_range() {
        let fleet = Fleet::builder()
            .gateways(MemStore::fleet(4))
            .build()
            .unwrap();

        for i in 0..1000 {
            let key = format!("key-{}", i);
            let shard = fleet.shard_for(&key).unwrap();
            assert!(shard < 4);
            assert_eq!(fleet.shard_for(&key).unwrap(), shard);
        }
    }

    #[test]
    fn test_empty_key_rejected() {
        let fleet = Fleet::builder()
            .gateways(MemStore::fleet(2))
            .build()
            .unwrap();

        assert!(matches!(
            fleet.shard_for(""),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_out_of_range_assignment_rejected() {
        struct Wild;

        impl ShardAssignment for Wild {
            fn shard(&self, _key: &str) -> usize {
                99
            }
        }

        let fleet = Fleet::builder()
            .gateways(MemStore::fleet(2))
            .assignment(Wild)
            .build()
            .unwrap();

        assert!(matches!(
            fleet.shard_for("key"),
            Err(Error::Spec(SpecError::ShardOutOfRange { shard: 99, shards: 2 }))
        ));
    }
}
