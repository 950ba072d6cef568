//! Router operations end to end against the in-memory engine.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use common::*;
use shardrail::store::{Criterion, LockMode, NamedQuery, Session, Value};
use shardrail::{Error, SpecError};

#[tokio::test]
async fn test_save_get_delete() {
    shardrail::logger();

    let (fleet, stores) = mem_fleet(2);
    let router = phone_router(fleet.clone());

    let key = "+15551234";
    let saved = router.save(Phone::new(key, "v1")).await.unwrap();
    assert_eq!(saved.phone_number, key);

    let shard = fleet.shard_for(key).unwrap();
    assert_eq!(stores[shard].len::<Phone>(), 1);
    assert_eq!(stores[1 - shard].len::<Phone>(), 0);

    let fetched = router.get(key).await.unwrap().unwrap();
    assert_eq!(fetched, saved);
    assert!(router.exists(key).await.unwrap());

    assert!(router.delete(key).await.unwrap());
    assert!(router.get(key).await.unwrap().is_none());
    assert!(!router.delete(key).await.unwrap());
}

#[tokio::test]
async fn test_update_with_nil_mutator() {
    let (fleet, _stores) = mem_fleet(2);
    let router = phone_router(fleet);

    let key = "+15551234";
    router.save(Phone::new(key, "v1")).await.unwrap();

    // The row exists but the mutator declines; nothing changes.
    let updated = router.update(key, |_row| None).await.unwrap();
    assert!(!updated);
    assert_eq!(router.get(key).await.unwrap().unwrap().value, "v1");

    let updated = router
        .update(key, |row| {
            row.map(|mut phone| {
                phone.value = "v2".into();
                phone
            })
        })
        .await
        .unwrap();
    assert!(updated);
    assert_eq!(router.get(key).await.unwrap().unwrap().value, "v2");
}

#[tokio::test]
async fn test_update_absent_row() {
    let (fleet, _stores) = mem_fleet(2);
    let router = phone_router(fleet);

    let updated = router.update("+15550000", |row| row).await.unwrap();
    assert!(!updated);
}

#[tokio::test]
async fn test_update_in_lock() {
    let (fleet, _stores) = mem_fleet(2);
    let router = phone_router(fleet);

    let key = "+15551234";
    router.save(Phone::new(key, "v1")).await.unwrap();

    let updated = router
        .update_in_lock(key, |row| {
            row.map(|mut phone| {
                phone.value = "locked".into();
                phone
            })
        })
        .await
        .unwrap();
    assert!(updated);
    assert_eq!(router.get(key).await.unwrap().unwrap().value, "locked");
}

#[tokio::test]
async fn test_create_or_update() {
    let (fleet, _stores) = mem_fleet(2);
    let router = phone_router(fleet);

    let generated = Arc::new(AtomicBool::new(false));

    let flag = generated.clone();
    let row = router
        .create_or_update(
            "testId",
            |mut phone| {
                phone.value = "new".into();
                Some(phone)
            },
            move || {
                flag.store(true, Ordering::SeqCst);
                Phone::new("testId", "gen")
            },
        )
        .await
        .unwrap();

    assert!(generated.load(Ordering::SeqCst));
    assert_eq!(row.value, "gen");

    // Second call mutates; the generator stays untouched.
    generated.store(false, Ordering::SeqCst);
    let row = router
        .create_or_update(
            "testId",
            |mut phone| {
                phone.value = "new".into();
                Some(phone)
            },
            || Phone::new("testId", "gen"),
        )
        .await
        .unwrap();

    assert!(!generated.load(Ordering::SeqCst));
    assert_eq!(row.value, "new");
    assert_eq!(router.get("testId").await.unwrap().unwrap().value, "new");
}

#[tokio::test]
async fn test_get_many_groups_by_shard() {
    let (fleet, _stores) = mem_fleet(4);
    let router = phone_router(fleet);

    let keys = ["+1", "+2", "+3", "+4", "+5"];
    for key in keys {
        router.save(Phone::new(key, key)).await.unwrap();
    }

    let rows = router.get_many(&keys).await.unwrap();
    assert_eq!(rows.len(), keys.len());

    let mut numbers: Vec<String> = rows.into_iter().map(|row| row.phone_number).collect();
    numbers.sort();
    assert_eq!(numbers, keys.iter().map(|key| key.to_string()).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_get_with_elevated_lock() {
    let (fleet, _stores) = mem_fleet(2);
    let router = phone_router(fleet);

    router.save(Phone::new("+1", "v")).await.unwrap();

    let row = router
        .get_with("+1", |spec| {
            spec.lock(LockMode::Read);
        })
        .await
        .unwrap();
    assert!(row.is_some());

    // Restricting further can make the read miss.
    let row = router
        .get_with("+1", |spec| {
            spec.restrict(Criterion::eq("value", "other"));
        })
        .await
        .unwrap();
    assert!(row.is_none());
}

#[tokio::test]
async fn test_save_with_handler() {
    let (fleet, _stores) = mem_fleet(2);
    let router = phone_router(fleet);

    let value = router
        .save_with(Phone::new("+1", "v"), |session, phone| {
            let number = phone.phone_number.clone();
            Box::pin(async move {
                assert!(session.in_transaction());
                Ok(number)
            })
        })
        .await
        .unwrap();

    assert_eq!(value, "+1");
    assert!(router.exists("+1").await.unwrap());
}

#[tokio::test]
async fn test_run_in_session() {
    let (fleet, _stores) = mem_fleet(2);
    let router = phone_router(fleet);

    router.save(Phone::new("+1", "v")).await.unwrap();

    let count = router
        .run_in_session("+1", |session| {
            Box::pin(async move {
                let row: Option<Phone> = session
                    .fetch_one(&Criterion::eq("phone_number", "+1"), LockMode::None)
                    .await?;
                Ok(row.is_some() as u64)
            })
        })
        .await
        .unwrap();

    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_run_with_criteria() {
    let (fleet, _stores) = mem_fleet(2);
    let router = phone_router(fleet);

    router.save(Phone::new("+1", "v")).await.unwrap();

    let found = router
        .run_with_criteria("+1", |session, criterion| {
            Box::pin(async move {
                let row: Option<Phone> = session.fetch_one(&criterion, LockMode::None).await?;
                Ok(row.is_some())
            })
        })
        .await
        .unwrap();

    assert!(found);
}

#[tokio::test]
async fn test_update_by_named_query() {
    let (fleet, stores) = mem_fleet(2);
    let router = phone_router(fleet.clone());

    for store in &stores {
        store.register_named_query::<Phone, _>("set_value", |params, row| {
            match params.get("value") {
                Some(Value::Text(value)) => {
                    row.value = value.clone();
                    true
                }
                _ => false,
            }
        });
    }

    let key = "+15551234";
    router.save(Phone::new(key, "v1")).await.unwrap();

    let affected = router
        .update_by_named_query(key, NamedQuery::new("set_value").param("value", "patched"))
        .await
        .unwrap();

    assert_eq!(affected, 1);
    assert_eq!(router.get(key).await.unwrap().unwrap().value, "patched");
}

#[tokio::test]
async fn test_lock_conflict_fails_fast() {
    let (fleet, stores) = mem_fleet(1);
    let router = phone_router(fleet);

    let key = "+15551234";
    router.save(Phone::new(key, "v1")).await.unwrap();

    // A foreign transaction pins the row.
    use shardrail::store::SessionGateway;
    let holder = shardrail::mem::MemGateway::new(stores[0].clone(), "holder");
    let mut session = holder.session().await.unwrap();
    session.begin(false).await.unwrap();
    session
        .fetch_one::<Phone>(&Criterion::eq("phone_number", key), LockMode::WriteNoWait)
        .await
        .unwrap();

    let err = router.update_in_lock(key, |row| row).await.unwrap_err();
    assert!(matches!(err, Error::LockConflict));

    session.rollback().await.unwrap();

    let updated = router.update_in_lock(key, |row| row).await.unwrap();
    assert!(updated);
}

#[tokio::test]
async fn test_construction_boundaries() {
    use shardrail::fleet::Fleet;
    use shardrail::mem::MemGateway;
    use shardrail::store::{EntityDescriptor, ValueKind};
    use shardrail::Router;

    // Empty fleets are rejected.
    let err = Fleet::<MemGateway>::builder().build().unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    // A keyed router requires a string lookup key.
    let (fleet, _stores) = mem_fleet(2);
    let descriptor =
        EntityDescriptor::<Phone>::id("phone_number", ValueKind::Int, |_| Value::Int(0));
    let err = Router::new(fleet.clone(), descriptor).unwrap_err();
    assert!(matches!(err, Error::Spec(SpecError::NotLookupKeyed)));

    // Empty routing keys are rejected.
    let router = phone_router(fleet);
    let err = router.get("").await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}
