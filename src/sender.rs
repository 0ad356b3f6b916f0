use std::time::Duration;

use reqwest::Client;

use crate::domain::MergedEvent;
use crate::errors::SinkError;
use crate::metrics::Telemetry;

const JSON_TIMEOUT: Duration = Duration::from_secs(5);
const CSV_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-event JSON delivery to the analytics sink.
pub struct JsonSender {
    client: Client,
    url: String,
}

impl JsonSender {
    pub fn new(client: Client, url: String) -> Self {
        JsonSender { client, url }
    }

    pub async fn send(&self, event: &MergedEvent, telemetry: &Telemetry) -> Result<(), SinkError> {
        let timer = telemetry.start_post_timer();
        let result = self
            .client
            .post(&self.url)
            .timeout(JSON_TIMEOUT)
            .json(event)
            .send()
            .await;
        timer.observe();

        match result {
            Ok(resp) if resp.status().is_success() => {
                telemetry.post_success();
                Ok(())
            }
            Ok(resp) => {
                telemetry.post_fail();
                Err(SinkError::Status(resp.status().as_u16()))
            }
            Err(e) => {
                telemetry.post_fail();
                Err(SinkError::Request(e))
            }
        }
    }
}

/// Per-batch CSV delivery to the analytics sink.
pub struct CsvSender {
    client: Client,
    url: String,
}

impl CsvSender {
    pub fn new(client: Client, url: String) -> Self {
        CsvSender { client, url }
    }

    pub async fn send(&self, payload_csv: &str, telemetry: &Telemetry) -> Result<(), SinkError> {
        let timer = telemetry.start_post_timer();
        let result = self
            .client
            .post(&self.url)
            .timeout(CSV_TIMEOUT)
            .header("Content-Type", "text/csv")
            .body(payload_csv.to_string())
            .send()
            .await;
        timer.observe();

        match result {
            Ok(resp) if resp.status().is_success() => {
                telemetry.post_success();
                Ok(())
            }
            Ok(resp) => {
                telemetry.post_fail();
                Err(SinkError::Status(resp.status().as_u16()))
            }
            Err(e) => {
                telemetry.post_fail();
                Err(SinkError::Request(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CustomerSummary, InventorySummary};
    use serde_json::json;

    fn sample_event() -> MergedEvent {
        MergedEvent::CustomerUpdate {
            customer: json!({"id": "c1", "status": "active"}),
            inventory_summary: InventorySummary {
                total_products: 0,
                low_stock_count: 0,
            },
        }
    }

    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn json_sender_reports_success_on_2xx() {
        let telemetry = Telemetry::new().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analytics/data"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let sender = JsonSender::new(Client::new(), format!("{}/analytics/data", server.uri()));
        let result = sender.send(&sample_event(), &telemetry).await;

        assert!(result.is_ok());
        assert_eq!(telemetry.post_success_count(), 1);
        assert_eq!(telemetry.post_fail_count(), 0);
    }

    #[tokio::test]
    async fn json_sender_reports_failure_on_5xx() {
        let telemetry = Telemetry::new().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analytics/data"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let sender = JsonSender::new(Client::new(), format!("{}/analytics/data", server.uri()));
        let result = sender.send(&sample_event(), &telemetry).await;

        match result {
            Err(SinkError::Status(500)) => {}
            other => panic!("expected Status(500), got {other:?}"),
        }
        assert_eq!(telemetry.post_fail_count(), 1);
    }

    #[tokio::test]
    async fn csv_sender_posts_text_csv_content_type() {
        let telemetry = Telemetry::new().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .and(header("content-type", "text/csv"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let sender = CsvSender::new(Client::new(), format!("{}/upload", server.uri()));
        let result = sender.send("type,customer_id\n", &telemetry).await;

        assert!(result.is_ok());
    }
}
