#![allow(dead_code)]

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use shardrail::fleet::Fleet;
use shardrail::mem::{MemGateway, MemStore};
use shardrail::store::{Entity, EntityDescriptor, Value, ValueKind};
use shardrail::{Config, RelatedRouter, Router};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phone {
    pub phone_number: String,
    pub value: String,
}

impl Phone {
    pub fn new(number: &str, value: &str) -> Self {
        Self {
            phone_number: number.into(),
            value: value.into(),
        }
    }
}

impl Entity for Phone {
    fn entity_name() -> &'static str {
        "phones"
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "phone_number" => Some(Value::text(&self.phone_number)),
            "value" => Some(Value::text(&self.value)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub company_key: String,
    pub company_usage_id: i64,
    pub name: String,
}

impl Entity for Company {
    fn entity_name() -> &'static str {
        "companies"
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "company_key" => Some(Value::text(&self.company_key)),
            "company_usage_id" => Some(Value::Int(self.company_usage_id)),
            "name" => Some(Value::text(&self.name)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    pub id: i64,
    pub company_ext_id: i64,
    pub name: String,
}

impl Entity for Department {
    fn entity_name() -> &'static str {
        "departments"
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::Int(self.id)),
            "company_ext_id" => Some(Value::Int(self.company_ext_id)),
            "name" => Some(Value::text(&self.name)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub key: String,
    pub id: i64,
    pub value: i64,
}

impl Item {
    pub fn new(value: i64) -> Self {
        Self {
            key: format!("item-{}", value),
            id: value,
            value,
        }
    }
}

impl Entity for Item {
    fn entity_name() -> &'static str {
        "items"
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "key" => Some(Value::text(&self.key)),
            "id" => Some(Value::Int(self.id)),
            "value" => Some(Value::Int(self.value)),
            _ => None,
        }
    }
}

pub fn mem_fleet(shards: usize) -> (Arc<Fleet<MemGateway>>, Vec<MemStore>) {
    mem_fleet_with(shards, Config::default())
}

pub fn mem_fleet_with(shards: usize, config: Config) -> (Arc<Fleet<MemGateway>>, Vec<MemStore>) {
    let gateways = MemStore::fleet(shards);
    let stores: Vec<MemStore> = gateways.iter().map(|gateway| gateway.store().clone()).collect();

    let fleet = Fleet::builder()
        .gateways(gateways)
        .config(config)
        .build()
        .unwrap();

    (fleet, stores)
}

pub fn phone_router(fleet: Arc<Fleet<MemGateway>>) -> Router<Phone, MemGateway> {
    Router::new(
        fleet,
        EntityDescriptor::lookup_key("phone_number", |phone: &Phone| {
            Value::text(&phone.phone_number)
        }),
    )
    .unwrap()
}

pub fn company_router(fleet: Arc<Fleet<MemGateway>>) -> Router<Company, MemGateway> {
    Router::new(
        fleet,
        EntityDescriptor::lookup_key("company_key", |company: &Company| {
            Value::text(&company.company_key)
        }),
    )
    .unwrap()
}

pub fn department_router(fleet: Arc<Fleet<MemGateway>>) -> RelatedRouter<Department, MemGateway> {
    RelatedRouter::new(
        fleet,
        EntityDescriptor::id("id", ValueKind::Int, |department: &Department| {
            Value::Int(department.id)
        }),
    )
    .unwrap()
}

pub fn item_router(fleet: Arc<Fleet<MemGateway>>) -> Router<Item, MemGateway> {
    Router::new(
        fleet,
        EntityDescriptor::lookup_key("key", |item: &Item| Value::text(&item.key)),
    )
    .unwrap()
}
