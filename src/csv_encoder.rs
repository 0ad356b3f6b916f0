use csv::{Terminator, WriterBuilder};

use crate::domain::MergedEvent;

const HEADER: [&str; 9] = [
    "type",
    "customer_id",
    "product_id",
    "status",
    "sku",
    "qty",
    "total_products",
    "low_stock_count",
    "total_customers",
];

/// Encodes a batch of merged events into the fixed CSV wire format.
/// Row count always equals `events.len()`; missing nested fields become
/// empty cells rather than panicking.
pub fn encode(events: &[MergedEvent]) -> String {
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(HEADER).expect("in-memory writer");

    for event in events {
        let row = match event {
            MergedEvent::CustomerUpdate {
                customer,
                inventory_summary,
            } => [
                "customer_update".to_string(),
                field(customer, "id"),
                String::new(),
                field(customer, "status"),
                String::new(),
                String::new(),
                inventory_summary.total_products.to_string(),
                inventory_summary.low_stock_count.to_string(),
                String::new(),
            ],
            MergedEvent::InventoryUpdate {
                product,
                customer_summary,
            } => [
                "inventory_update".to_string(),
                String::new(),
                field(product, "product_id"),
                String::new(),
                field(product, "sku"),
                field(product, "qty"),
                String::new(),
                String::new(),
                customer_summary.total_customers.to_string(),
            ],
        };
        writer.write_record(&row).expect("in-memory writer");
    }

    String::from_utf8(writer.into_inner().expect("in-memory writer")).expect("utf8 csv output")
}

/// Stringifies a nested JSON scalar field, empty string if absent or not
/// a simple scalar.
fn field(value: &serde_json::Value, key: &str) -> String {
    match value.get(key) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CustomerSummary, InventorySummary};
    use serde_json::json;

    #[test]
    fn mixed_batch_matches_fixed_layout() {
        let events = vec![
            MergedEvent::CustomerUpdate {
                customer: json!({"id": "c1", "status": "active"}),
                inventory_summary: InventorySummary {
                    total_products: 2,
                    low_stock_count: 1,
                },
            },
            MergedEvent::InventoryUpdate {
                product: json!({"product_id": "p1", "sku": "SKU-001", "qty": 5}),
                customer_summary: CustomerSummary { total_customers: 3 },
            },
        ];

        let csv = encode(&events);
        let expected = "type,customer_id,product_id,status,sku,qty,total_products,low_stock_count,total_customers\n\
customer_update,c1,,active,,,2,1,\n\
inventory_update,,p1,,SKU-001,5,,,3\n";
        assert_eq!(csv, expected);
    }

    #[test]
    fn row_count_equals_header_plus_batch_size() {
        let events = vec![
            MergedEvent::InventoryUpdate {
                product: json!({}),
                customer_summary: CustomerSummary { total_customers: 0 },
            };
            5
        ];
        let csv = encode(&events);
        assert_eq!(csv.lines().count(), events.len() + 1);
    }

    #[test]
    fn missing_nested_fields_encode_as_empty_cells() {
        let events = vec![MergedEvent::CustomerUpdate {
            customer: json!({"id": "c1"}),
            inventory_summary: InventorySummary {
                total_products: 0,
                low_stock_count: 0,
            },
        }];
        let csv = encode(&events);
        let row = csv.lines().nth(1).unwrap();
        assert_eq!(row, "customer_update,c1,,,,,0,0,");
    }

    #[test]
    fn empty_batch_is_header_only() {
        let csv = encode(&[]);
        assert_eq!(csv.lines().count(), 1);
    }
}
