use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One of the two inbound streams this forwarder co-groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Customer,
    Inventory,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Customer => "customer",
            Topic::Inventory => "inventory",
        }
    }
}

/// Delivery mode selected via `ANALYTICS_MODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Json,
    Csv,
}

impl DeliveryMode {
    pub fn from_env_str(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "csv" => DeliveryMode::Csv,
            _ => DeliveryMode::Json,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventorySummary {
    pub total_products: usize,
    pub low_stock_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerSummary {
    pub total_customers: usize,
}

/// The unit the analytics sink consumes. Internally tagged so the wire
/// shape matches `{"type": "customer_update", ...}` verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum MergedEvent {
    #[serde(rename = "customer_update")]
    CustomerUpdate {
        customer: Value,
        inventory_summary: InventorySummary,
    },
    #[serde(rename = "inventory_update")]
    InventoryUpdate {
        product: Value,
        customer_summary: CustomerSummary,
    },
}

impl MergedEvent {
    pub fn type_str(&self) -> &'static str {
        match self {
            MergedEvent::CustomerUpdate { .. } => "customer_update",
            MergedEvent::InventoryUpdate { .. } => "inventory_update",
        }
    }
}

/// Failure envelope forwarded to the dead-letter topic. Fields that don't
/// apply to a given failure path are omitted, not nulled.
#[derive(Debug, Clone, Serialize)]
pub struct DlqEnvelope {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<MergedEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_rows: Option<usize>,
}

impl DlqEnvelope {
    pub fn for_json_failure(error: String, topic: &str, key: &str, payload: MergedEvent) -> Self {
        DlqEnvelope {
            error,
            source_topic: Some(topic.to_string()),
            key: Some(key.to_string()),
            payload: Some(payload),
            source_mode: None,
            payload_rows: None,
        }
    }

    pub fn for_csv_failure(error: String, payload_rows: usize) -> Self {
        DlqEnvelope {
            error,
            source_topic: None,
            key: None,
            payload: None,
            source_mode: Some("csv"),
            payload_rows: Some(payload_rows),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customer_update_serializes_with_tag() {
        let ev = MergedEvent::CustomerUpdate {
            customer: serde_json::json!({"id": "c1"}),
            inventory_summary: InventorySummary {
                total_products: 2,
                low_stock_count: 1,
            },
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["type"], "customer_update");
        assert_eq!(v["customer"]["id"], "c1");
        assert_eq!(v["inventory_summary"]["total_products"], 2);
    }

    #[test]
    fn dlq_envelope_omits_unset_fields() {
        let env = DlqEnvelope::for_csv_failure("analytics_http_500".into(), 3);
        let v = serde_json::to_value(&env).unwrap();
        assert!(v.get("source_topic").is_none());
        assert!(v.get("key").is_none());
        assert_eq!(v["source_mode"], "csv");
        assert_eq!(v["payload_rows"], 3);
    }

    #[test]
    fn delivery_mode_is_case_insensitive() {
        assert_eq!(DeliveryMode::from_env_str("CSV"), DeliveryMode::Csv);
        assert_eq!(DeliveryMode::from_env_str("Json"), DeliveryMode::Json);
        assert_eq!(DeliveryMode::from_env_str("bogus"), DeliveryMode::Json);
    }
}
