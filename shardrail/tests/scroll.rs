//! Cross-shard scroll iteration end to end.

mod common;

use std::collections::BTreeSet;

use common::*;
use shardrail::store::{Criterion, Direction};
use shardrail::{Error, ScrollPointer, SpecError};

async fn insert_items(
    router: &shardrail::Router<Item, shardrail::mem::MemGateway>,
    values: impl Iterator<Item = i64>,
) {
    for value in values {
        router.save(Item::new(value)).await.unwrap();
    }
}

#[tokio::test]
async fn test_scroll_down_covers_every_row_once() {
    shardrail::logger();

    let (fleet, _stores) = mem_fleet(2);
    let router = item_router(fleet);

    insert_items(&router, 1..=400).await;

    let mut pointer = None;
    let mut seen = Vec::new();
    let mut first_page = None;

    loop {
        let result = router
            .scroll_down(Criterion::All, pointer, 10, "id")
            .await
            .unwrap();

        if result.items.is_empty() {
            pointer = Some(result.pointer);
            break;
        }

        assert!(result.items.len() <= 10);
        if first_page.is_none() {
            first_page = Some(result.items.iter().map(|item| item.value).collect::<Vec<_>>());
        }

        seen.extend(result.items.iter().map(|item| item.value));
        pointer = Some(result.pointer);
    }

    // Globally ascending, no duplicates, full coverage.
    assert_eq!(first_page.unwrap(), (1..=10).collect::<Vec<_>>());
    assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(
        seen.iter().copied().collect::<BTreeSet<_>>(),
        (1..=400).collect::<BTreeSet<_>>()
    );

    // Rows appended after the fact continue from the same pointer.
    insert_items(&router, 401..=800).await;

    let mut appended = Vec::new();
    loop {
        let result = router
            .scroll_down(Criterion::All, pointer, 10, "id")
            .await
            .unwrap();

        if result.items.is_empty() {
            break;
        }

        appended.extend(result.items.iter().map(|item| item.value));
        pointer = Some(result.pointer);
    }

    assert!(appended.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(
        appended.iter().copied().collect::<BTreeSet<_>>(),
        (401..=800).collect::<BTreeSet<_>>()
    );
}

#[tokio::test]
async fn test_scroll_up_descends() {
    let (fleet, _stores) = mem_fleet(2);
    let router = item_router(fleet);

    insert_items(&router, 1..=50).await;

    let result = router
        .scroll_up(Criterion::All, None, 10, "id")
        .await
        .unwrap();

    let values: Vec<i64> = result.items.iter().map(|item| item.value).collect();
    assert_eq!(values, (41..=50).rev().collect::<Vec<_>>());
}

#[tokio::test]
async fn test_scroll_respects_criterion() {
    let (fleet, _stores) = mem_fleet(2);
    let router = item_router(fleet);

    insert_items(&router, 1..=40).await;

    let mut pointer = None;
    let mut seen = Vec::new();

    loop {
        let result = router
            .scroll_down(
                Criterion::gt("value", 30i64),
                pointer,
                4,
                "id",
            )
            .await
            .unwrap();

        if result.items.is_empty() {
            break;
        }

        seen.extend(result.items.iter().map(|item| item.value));
        pointer = Some(result.pointer);
    }

    assert_eq!(seen, (31..=40).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_exhausted_pointer_is_stable() {
    let (fleet, _stores) = mem_fleet(2);
    let router = item_router(fleet);

    insert_items(&router, 1..=5).await;

    let first = router
        .scroll_down(Criterion::All, None, 10, "id")
        .await
        .unwrap();
    assert_eq!(first.items.len(), 5);

    let empty = router
        .scroll_down(Criterion::All, Some(first.pointer.clone()), 10, "id")
        .await
        .unwrap();
    assert!(empty.items.is_empty());
    assert_eq!(empty.pointer, first.pointer);
}

#[tokio::test]
async fn test_scroll_boundaries() {
    let (fleet, _stores) = mem_fleet(2);
    let router = item_router(fleet);

    // Zero page size.
    let err = router
        .scroll_down(Criterion::All, None, 0, "id")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    // Direction mismatch.
    let ascending = ScrollPointer::new(Direction::Ascending, 2);
    let err = router
        .scroll_up(Criterion::All, Some(ascending), 10, "id")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Spec(SpecError::PointerDirection)));

    // Pointer from a different fleet width.
    let narrow = ScrollPointer::new(Direction::Ascending, 3);
    let err = router
        .scroll_down(Criterion::All, Some(narrow), 10, "id")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Spec(SpecError::PointerWidth { .. })));

    // Unknown sort field.
    insert_items(&router, 1..=1).await;
    let err = router
        .scroll_down(Criterion::All, None, 10, "nope")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Spec(SpecError::MissingSortField(_))));
}

#[tokio::test]
async fn test_pointer_wire_form() {
    let (fleet, _stores) = mem_fleet(2);
    let router = item_router(fleet);

    insert_items(&router, 1..=20).await;

    let result = router
        .scroll_down(Criterion::All, None, 10, "id")
        .await
        .unwrap();

    // Round-trip through the opaque token and keep scrolling.
    let token = result.pointer.encode().unwrap();
    let pointer = ScrollPointer::decode(&token).unwrap();

    let rest = router
        .scroll_down(Criterion::All, Some(pointer), 10, "id")
        .await
        .unwrap();

    let values: Vec<i64> = rest.items.iter().map(|item| item.value).collect();
    assert_eq!(values, (11..=20).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_max_page_size_enforced() {
    let mut config = shardrail::Config::default();
    config.scroll.max_page_size = Some(16);

    let (fleet, _stores) = mem_fleet_with(2, config);
    let router = item_router(fleet);

    let err = router
        .scroll_down(Criterion::All, None, 17, "id")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}
