//! Walk through the main surfaces against the in-memory engine.
//!
//! Run with `cargo run --example demo`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use shardrail::fleet::Fleet;
use shardrail::mem::MemStore;
use shardrail::observer::TracingObserver;
use shardrail::stats::StatsObserver;
use shardrail::store::{Criterion, Entity, EntityDescriptor, Value, ValueKind};
use shardrail::{AssociationSpec, Error, RelatedRouter, Router};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Account {
    account_key: String,
    region_id: i64,
    balance: i64,
}

impl Entity for Account {
    fn entity_name() -> &'static str {
        "accounts"
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "account_key" => Some(Value::text(&self.account_key)),
            "region_id" => Some(Value::Int(self.region_id)),
            "balance" => Some(Value::Int(self.balance)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Ledger {
    id: i64,
    region_id: i64,
    amount: i64,
}

impl Entity for Ledger {
    fn entity_name() -> &'static str {
        "ledgers"
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::Int(self.id)),
            "region_id" => Some(Value::Int(self.region_id)),
            "amount" => Some(Value::Int(self.amount)),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    shardrail::logger();

    let stats = Arc::new(StatsObserver::new());
    let fleet = Fleet::builder()
        .gateways(MemStore::fleet(4))
        .observer(Arc::new(TracingObserver))
        .observer(stats.clone())
        .build()?;

    let accounts = Router::new(
        fleet.clone(),
        EntityDescriptor::lookup_key("account_key", |account: &Account| {
            Value::text(&account.account_key)
        }),
    )?;

    let ledgers = RelatedRouter::new(
        fleet.clone(),
        EntityDescriptor::id("id", ValueKind::Int, |ledger: &Ledger| Value::Int(ledger.id)),
    )?;

    // Keyed writes route to one shard each.
    for i in 0..16 {
        accounts
            .save(Account {
                account_key: format!("acct-{}", i),
                region_id: i % 4,
                balance: 100 * i,
            })
            .await?;
    }

    // A locked context composes dependent writes in one transaction.
    accounts
        .lock_and_get("acct-3")?
        .mutate(|account| account.balance += 50)
        .save(&ledgers, |account| Ledger {
            id: 1,
            region_id: account.region_id,
            amount: 50,
        })
        .execute()
        .await?;

    // Read the parent back with its ledger rows attached.
    let enriched = accounts
        .read_only("acct-3")?
        .augment(
            &ledgers,
            AssociationSpec::new("region_id", "region_id"),
            |account, rows: Vec<Ledger>| {
                println!("{} has {} ledger row(s)", account.account_key, rows.len());
            },
        )
        .execute_one()
        .await?;
    println!("balance after credit: {:?}", enriched.map(|a| a.balance));

    // Cross-shard reads: serial scatter-gather and ordered scroll.
    let counts = accounts.count(Criterion::All).await?;
    println!("per-shard counts: {:?}", counts);

    let mut pointer = None;
    let mut total = 0;
    loop {
        let result = accounts
            .scroll_down(Criterion::All, pointer, 5, "balance")
            .await?;
        if result.items.is_empty() {
            break;
        }
        total += result.items.len();
        pointer = Some(result.pointer);
    }
    println!("scrolled {} accounts in balance order", total);

    println!("{:#?}", stats.counts());

    Ok(())
}
