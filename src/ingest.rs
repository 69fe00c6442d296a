use crate::models::{IngestPayload, IngestResponse};
use crate::scrapers::traits::IngestSink;
use crate::scrapers::types::IngestConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

/// Posts assembled listings to the ingestion API
pub struct IngestClient {
    client: Client,
    endpoint: String,
}

impl IngestClient {
    pub fn new(config: &IngestConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("listing-scout/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: ingest_endpoint(&config.api_base),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn ingest_endpoint(api_base: &str) -> String {
    format!("{}/api/ingest", api_base.trim_end_matches('/'))
}

#[async_trait]
impl IngestSink for IngestClient {
    async fn submit(&self, payload: &IngestPayload) -> Result<IngestResponse> {
        debug!("Posting listing for {} to {}", payload.source_url, self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .context("Failed to reach ingestion API")?;

        if !response.status().is_success() {
            warn!("Ingestion API returned status: {}", response.status());
            anyhow::bail!("Ingestion rejected: {}", response.status());
        }

        let body: IngestResponse = response
            .json()
            .await
            .context("Failed to decode ingestion response")?;
        info!("Ingestion status: {}", body.status);
        Ok(body)
    }

    fn sink_name(&self) -> &'static str {
        "ingest-api"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExtractedListing;
    use std::sync::Mutex;

    #[test]
    fn test_endpoint_joins_cleanly() {
        assert_eq!(ingest_endpoint("http://localhost:8000"), "http://localhost:8000/api/ingest");
        assert_eq!(ingest_endpoint("https://api.example.com/"), "https://api.example.com/api/ingest");

        let client = IngestClient::new(&IngestConfig::default()).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8000/api/ingest");
    }

    /// Keeps submitted payloads in memory
    #[derive(Default)]
    struct RecordingSink {
        received: Mutex<Vec<IngestPayload>>,
    }

    #[async_trait]
    impl IngestSink for RecordingSink {
        async fn submit(&self, payload: &IngestPayload) -> Result<IngestResponse> {
            self.received.lock().unwrap().push(payload.clone());
            Ok(IngestResponse {
                created_listing_id: None,
                status: "queued".to_string(),
            })
        }

        fn sink_name(&self) -> &'static str {
            "recording"
        }
    }

    #[tokio::test]
    async fn test_sink_receives_assembled_payload() {
        let sink = RecordingSink::default();
        let listing = ExtractedListing {
            title: "Loft near the river".to_string(),
            price_text: "$2,100".to_string(),
            source_url: "https://example.com/item/9".to_string(),
            ..Default::default()
        };

        let response = sink.submit(&IngestPayload::from(&listing)).await.unwrap();

        assert_eq!(response.status, "queued");
        let received = sink.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].raw_json.price, "$2,100");
        assert_eq!(received[0].source_url, "https://example.com/item/9");
    }
}
