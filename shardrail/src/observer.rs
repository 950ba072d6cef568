//! Observer chain wrapped around every executed operation.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::error::Error;
use crate::ops::OpKind;

/// Immutable record describing one dispatched operation.
#[derive(Debug, Clone)]
pub struct ObserverContext {
    /// Public method name that produced the operation.
    pub command: &'static str,
    /// Operation variant.
    pub kind: OpKind,
    /// Entity name.
    pub entity: &'static str,
    /// Router type that dispatched the operation.
    pub router: &'static str,
    /// Shard index.
    pub shard: usize,
    /// Name of the shard's gateway.
    pub shard_name: String,
}

/// Receives before/after/on-error callbacks around each operation.
///
/// Observers are notified outside the operation itself, so they can
/// record but never suppress an error. Keep them off the critical path:
/// no blocking I/O beyond what metric recording already does.
pub trait Observer: Send + Sync {
    fn before(&self, _ctx: &ObserverContext) {}

    fn after(&self, _ctx: &ObserverContext, _elapsed: Duration) {}

    fn on_error(&self, _ctx: &ObserverContext, _error: &Error, _elapsed: Duration) {}
}

/// Ordered chain of observers owned by the fleet.
#[derive(Clone, Default)]
pub struct ObserverChain {
    observers: Vec<Arc<dyn Observer>>,
}

impl ObserverChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, observer: Arc<dyn Observer>) {
        self.observers.push(observer);
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub(crate) fn before(&self, ctx: &ObserverContext) {
        for observer in &self.observers {
            observer.before(ctx);
        }
    }

    pub(crate) fn after(&self, ctx: &ObserverContext, elapsed: Duration) {
        for observer in &self.observers {
            observer.after(ctx, elapsed);
        }
    }

    pub(crate) fn on_error(&self, ctx: &ObserverContext, err: &Error, elapsed: Duration) {
        for observer in &self.observers {
            observer.on_error(ctx, err, elapsed);
        }
    }
}

impl std::fmt::Debug for ObserverChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverChain")
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Logs every operation through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn after(&self, ctx: &ObserverContext, elapsed: Duration) {
        debug!(
            "[{}] {}::{} \"{}\" completed in {:?}",
            ctx.shard_name, ctx.router, ctx.command, ctx.kind, elapsed,
        );
    }

    fn on_error(&self, ctx: &ObserverContext, err: &Error, elapsed: Duration) {
        error!(
            "[{}] {}::{} \"{}\" failed after {:?}: {}",
            ctx.shard_name, ctx.router, ctx.command, ctx.kind, elapsed, err,
        );
    }
}

/// Forwards to an inner observer only when the record matches the
/// configured entity and/or router names. This is the listener fan-out:
/// one chain entry per (entity, listener) registration.
pub struct FilteredObserver {
    entity: Option<&'static str>,
    router: Option<&'static str>,
    inner: Arc<dyn Observer>,
}

impl FilteredObserver {
    pub fn new(
        entity: Option<&'static str>,
        router: Option<&'static str>,
        inner: Arc<dyn Observer>,
    ) -> Self {
        Self {
            entity,
            router,
            inner,
        }
    }

    /// Listener keyed by entity name.
    pub fn for_entity(entity: &'static str, inner: Arc<dyn Observer>) -> Self {
        Self::new(Some(entity), None, inner)
    }

    /// Listener keyed by router type.
    pub fn for_router(router: &'static str, inner: Arc<dyn Observer>) -> Self {
        Self::new(None, Some(router), inner)
    }

    fn matches(&self, ctx: &ObserverContext) -> bool {
        self.entity.map(|entity| entity == ctx.entity).unwrap_or(true)
            && self.router.map(|router| router == ctx.router).unwrap_or(true)
    }
}

impl Observer for FilteredObserver {
    fn before(&self, ctx: &ObserverContext) {
        if self.matches(ctx) {
            self.inner.before(ctx);
        }
    }

    fn after(&self, ctx: &ObserverContext, elapsed: Duration) {
        if self.matches(ctx) {
            self.inner.after(ctx, elapsed);
        }
    }

    fn on_error(&self, ctx: &ObserverContext, err: &Error, elapsed: Duration) {
        if self.matches(ctx) {
            self.inner.on_error(ctx, err, elapsed);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recording {
        commands: Mutex<Vec<&'static str>>,
    }

    impl Observer for Recording {
        fn before(&self, ctx: &ObserverContext) {
            self.commands.lock().push(ctx.command);
        }
    }

    fn record(entity: &'static str, router: &'static str) -> ObserverContext {
        ObserverContext {
            command: "get",
            kind: OpKind::Get,
            entity,
            router,
            shard: 0,
            shard_name: "shard_0".into(),
        }
    }

    #[test]
    fn test_filtered_observer() {
        let recording = Arc::new(Recording::default());
        let filtered = FilteredObserver::for_entity("phones", recording.clone());

        filtered.before(&record("phones", "Router"));
        filtered.before(&record("companies", "Router"));

        assert_eq!(recording.commands.lock().len(), 1);
    }

    #[test]
    fn test_chain_order() {
        let first = Arc::new(Recording::default());
        let second = Arc::new(Recording::default());

        let mut chain = ObserverChain::new();
        chain.push(first.clone());
        chain.push(second.clone());
        chain.before(&record("phones", "Router"));

        assert_eq!(first.commands.lock().len(), 1);
        assert_eq!(second.commands.lock().len(), 1);
    }
}
