//! Transaction lifecycle around one operation context.
//!
//! The runner owns every exit path: commit on success, rollback on error,
//! session close regardless. In nested mode it touches nothing; the outer
//! frame owns begin, commit and rollback.

use std::time::Instant;

use tracing::{error, warn};

use crate::error::Error;
use crate::observer::{ObserverChain, ObserverContext};
use crate::ops::Operation;
use crate::store::{Session, SessionGateway};

/// How the runner frames the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    ReadWrite,
    ReadOnly,
    /// No begin/commit at all; the engine permits bare read-only access.
    Skip,
}

/// The shared transaction handed to nested operations: the open session
/// plus the shard it belongs to.
pub struct TxnScope<'a, S> {
    pub(crate) session: &'a mut S,
    pub(crate) shard: usize,
}

impl<'a, S> TxnScope<'a, S> {
    pub(crate) fn new(session: &'a mut S, shard: usize) -> Self {
        Self { session, shard }
    }

    pub fn shard(&self) -> usize {
        self.shard
    }

    pub fn session(&mut self) -> &mut S {
        self.session
    }
}

/// Execute one operation in its own session and transaction.
pub(crate) async fn execute<G, O>(
    gateway: &G,
    chain: &ObserverChain,
    record: ObserverContext,
    mode: TxMode,
    op: O,
) -> Result<O::Output, Error>
where
    G: SessionGateway,
    O: Operation<G::Session>,
{
    let mut session = gateway.session().await?;
    let result = observed(&mut session, chain, record, mode, op).await;

    if let Err(err) = session.close().await {
        warn!("session close failed: {} [{}]", err, gateway.shard_name());
    }

    result
}

/// Execute one operation against the caller's open transaction. No
/// begin, no commit, no rollback; errors propagate to the outer frame.
pub(crate) async fn execute_nested<S, O>(
    session: &mut S,
    chain: &ObserverChain,
    record: ObserverContext,
    op: O,
) -> Result<O::Output, Error>
where
    S: Session,
    O: Operation<S>,
{
    chain.before(&record);
    let started = Instant::now();

    let result = op.apply(session).await;

    match &result {
        Ok(_) => chain.after(&record, started.elapsed()),
        Err(err) => chain.on_error(&record, err, started.elapsed()),
    }

    result
}

async fn observed<S, O>(
    session: &mut S,
    chain: &ObserverChain,
    record: ObserverContext,
    mode: TxMode,
    op: O,
) -> Result<O::Output, Error>
where
    S: Session,
    O: Operation<S>,
{
    chain.before(&record);
    let started = Instant::now();

    let result = framed(session, mode, op).await;

    match &result {
        Ok(_) => chain.after(&record, started.elapsed()),
        Err(err) => chain.on_error(&record, err, started.elapsed()),
    }

    result
}

async fn framed<S, O>(session: &mut S, mode: TxMode, op: O) -> Result<O::Output, Error>
where
    S: Session,
    O: Operation<S>,
{
    if mode == TxMode::Skip {
        return op.apply(session).await;
    }

    session.begin(mode == TxMode::ReadOnly).await?;

    match op.apply(session).await {
        Ok(value) => {
            session.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = session.rollback().await {
                error!("rollback failed: {}", rollback);
            }
            Err(err)
        }
    }
}
