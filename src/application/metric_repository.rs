// Port for the external metric query service
use crate::domain::query_result::QueryResult;
use crate::domain::request::DataRequest;
use async_trait::async_trait;

#[async_trait]
pub trait MetricQueryService: Send + Sync {
    /// Execute one time-series query
    async fn query(&self, request: &DataRequest) -> anyhow::Result<QueryResult>;
}
