//! Observer chain and stats recording end to end.

mod common;

use std::sync::Arc;

use parking_lot::Mutex;

use common::*;
use shardrail::fleet::Fleet;
use shardrail::mem::MemStore;
use shardrail::observer::{FilteredObserver, Observer, ObserverContext, TracingObserver};
use shardrail::ops::OpKind;
use shardrail::stats::StatsObserver;
use shardrail::store::{EntityDescriptor, Value};
use shardrail::{Error, Router};

#[derive(Default)]
struct Recording {
    records: Mutex<Vec<(String, OpKind, String)>>,
}

impl Observer for Recording {
    fn before(&self, ctx: &ObserverContext) {
        self.records
            .lock()
            .push((ctx.command.to_string(), ctx.kind, ctx.shard_name.clone()));
    }
}

fn observed_fleet() -> (
    Arc<Fleet<shardrail::mem::MemGateway>>,
    Arc<Recording>,
    Arc<StatsObserver>,
) {
    let recording = Arc::new(Recording::default());
    let stats = Arc::new(StatsObserver::new());

    let fleet = Fleet::builder()
        .gateways(MemStore::fleet(2))
        .observer(Arc::new(TracingObserver))
        .observer(recording.clone())
        .observer(stats.clone())
        .build()
        .unwrap();

    (fleet, recording, stats)
}

#[tokio::test]
async fn test_observer_records_commands_and_variants() {
    shardrail::logger();

    let (fleet, recording, _stats) = observed_fleet();
    let router = phone_router(fleet.clone());

    router.save(Phone::new("+1", "v")).await.unwrap();
    router.get("+1").await.unwrap();
    router.update("+1", |row| row).await.unwrap();
    router.delete("+1").await.unwrap();

    let records = recording.records.lock();
    let commands: Vec<&str> = records.iter().map(|record| record.0.as_str()).collect();
    assert_eq!(commands, vec!["save", "get", "update", "delete"]);

    let kinds: Vec<OpKind> = records.iter().map(|record| record.1).collect();
    assert_eq!(
        kinds,
        vec![
            OpKind::Save,
            OpKind::GetByKey,
            OpKind::GetAndUpdate,
            OpKind::DeleteByKey,
        ]
    );

    let shard = fleet.shard_for("+1").unwrap();
    assert!(records
        .iter()
        .all(|record| record.2 == format!("shard_{}", shard)));
}

#[tokio::test]
async fn test_stats_observer_counts() {
    let (fleet, _recording, stats) = observed_fleet();
    let router = phone_router(fleet);

    router.save(Phone::new("+1", "v")).await.unwrap();
    router.get("+1").await.unwrap();
    router.get("+404").await.unwrap();

    let counts = stats.counts();
    assert_eq!(counts.operations, 3);
    assert_eq!(counts.completed, 3);
    assert_eq!(counts.errors, 0);
    assert_eq!(counts.writes, 1);
    assert_eq!(counts.reads, 2);

    let per_operation = stats.per_operation();
    assert_eq!(per_operation["save"], 1);
    assert_eq!(per_operation["get_by_key"], 2);
}

#[tokio::test]
async fn test_non_unique_fetch_is_rejected() {
    let (fleet, _recording, stats) = observed_fleet();
    let router = phone_router(fleet);

    router.save(Phone::new("+1", "dup")).await.unwrap();
    router.save(Phone::new("+1", "dup")).await.unwrap();

    let err = router.get("+1").await.unwrap_err();
    assert!(matches!(err, Error::NonUnique));
    assert_eq!(stats.counts().errors, 1);
}

#[tokio::test]
async fn test_filtered_observer_scopes_by_entity() {
    let recording = Arc::new(Recording::default());

    let fleet = Fleet::builder()
        .gateways(MemStore::fleet(2))
        .observer(Arc::new(FilteredObserver::for_entity(
            "companies",
            recording.clone(),
        )))
        .build()
        .unwrap();

    let phones = phone_router(fleet.clone());
    let companies: Router<Company, _> = Router::new(
        fleet,
        EntityDescriptor::lookup_key("company_key", |company: &Company| {
            Value::text(&company.company_key)
        }),
    )
    .unwrap();

    phones.save(Phone::new("+1", "v")).await.unwrap();
    companies
        .save(Company {
            company_key: "acme".into(),
            company_usage_id: 1,
            name: "Acme".into(),
        })
        .await
        .unwrap();

    let records = recording.records.lock();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].0, "save");
}

#[tokio::test]
async fn test_observers_do_not_suppress_errors() {
    let (fleet, _recording, stats) = observed_fleet();
    let router = phone_router(fleet);

    let err = router
        .update_by_named_query("+1", shardrail::store::NamedQuery::new("missing"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::OperationFailed(_)));
    assert_eq!(stats.counts().errors, 1);
}
