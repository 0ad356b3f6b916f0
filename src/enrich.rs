use std::collections::HashMap;

use log::warn;
use serde_json::Value;

use crate::domain::{CustomerSummary, InventorySummary, MergedEvent, Topic};

/// Owns the two co-grouping snapshot stores. Confined to the consumer
/// loop's task; no locking, nothing else ever touches it.
#[derive(Default)]
pub struct Enricher {
    customers: HashMap<String, Value>,
    products: HashMap<String, Value>,
}

impl Enricher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enrich(&mut self, topic: Topic, key: &str, payload: Option<Value>) -> Option<MergedEvent> {
        let payload = match payload {
            Some(p) => p,
            None => {
                warn!("skip_unmerged topic={} key={key}", topic.as_str());
                return None;
            }
        };

        match topic {
            Topic::Customer => {
                self.customers.insert(key.to_string(), payload.clone());
                let total_products = self.products.len();
                let low_stock_count = self
                    .products
                    .values()
                    .filter(|p| p.get("qty").and_then(Value::as_i64).is_some_and(|q| q < 20))
                    .count();
                Some(MergedEvent::CustomerUpdate {
                    customer: payload,
                    inventory_summary: InventorySummary {
                        total_products,
                        low_stock_count,
                    },
                })
            }
            Topic::Inventory => {
                self.products.insert(key.to_string(), payload.clone());
                let total_customers = self.customers.len();
                Some(MergedEvent::InventoryUpdate {
                    product: payload,
                    customer_summary: CustomerSummary { total_customers },
                })
            }
        }
    }
}
