// HTTP client for the performance query service
use crate::application::metric_repository::MetricQueryService;
use crate::domain::query_result::QueryResult;
use crate::domain::request::DataRequest;
use crate::infrastructure::config::QueryServiceSettings;
use anyhow::{Context, Result};
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct HttpMetricQueryService {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpMetricQueryService {
    pub fn new(settings: &QueryServiceSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .context("Failed to build query service client")?;
        Ok(Self {
            client,
            endpoint: settings.endpoint(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl MetricQueryService for HttpMetricQueryService {
    async fn query(&self, request: &DataRequest) -> Result<QueryResult> {
        tracing::debug!(
            "POST {} ({} metrics, downsample {:?})",
            self.endpoint,
            request.metrics.len(),
            request.downsample
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(request)
            .send()
            .await
            .context("Failed to send request to query service")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Query service failed with status {}: {}", status, body);
        }

        response
            .json::<QueryResult>()
            .await
            .context("Failed to parse query service response")
    }
}
