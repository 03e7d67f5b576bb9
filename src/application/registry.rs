// Chart registry - Named chart instances owned by the hosting session
use crate::application::admission::AdmissionGate;
use crate::application::chart_service::{ChartRenderer, ChartSnapshot};
use crate::domain::chart_config::{ChartConfig, ChartType};
use crate::domain::error::{ChartError, ChartResult};
use crate::domain::patch::ChartConfigPatch;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// One named chart: its current config and the last snapshot rendered from it.
#[derive(Debug, Clone)]
pub struct ChartInstance {
    pub config: Arc<ChartConfig>,
    pub snapshot: Option<Arc<ChartSnapshot>>,
    pub last_error: Option<String>,
    /// Taken from a registry-wide counter whenever the config is replaced, so a
    /// name that is removed and stored again never reuses a revision.
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    pub revision: u64,
    pub rendered: bool,
}

#[derive(Clone)]
pub struct ChartRegistry {
    charts: Arc<RwLock<HashMap<String, ChartInstance>>>,
    last_revision: Arc<AtomicU64>,
    renderer: ChartRenderer,
    gate: AdmissionGate,
}

impl ChartRegistry {
    pub fn new(renderer: ChartRenderer, gate: AdmissionGate) -> Self {
        Self {
            charts: Arc::new(RwLock::new(HashMap::new())),
            last_revision: Arc::new(AtomicU64::new(0)),
            renderer,
            gate,
        }
    }

    /// Store `config` under `name`, replacing any previous config wholesale.
    /// Returns the new revision.
    pub async fn upsert(&self, name: &str, config: ChartConfig) -> ChartResult<u64> {
        self.renderer.validate(&config)?;
        let mut charts = self.charts.write().await;
        let revision = self.next_revision();
        charts.insert(
            name.to_string(),
            ChartInstance {
                config: Arc::new(config),
                snapshot: None,
                last_error: None,
                revision,
            },
        );
        tracing::info!("Chart '{}' stored at revision {}", name, revision);
        Ok(revision)
    }

    /// Apply `patch` to the stored config. The previous snapshot is kept until
    /// the next update replaces it.
    pub async fn patch(
        &self,
        name: &str,
        patch: ChartConfigPatch,
    ) -> ChartResult<Arc<ChartConfig>> {
        let mut charts = self.charts.write().await;
        let instance = charts
            .get_mut(name)
            .ok_or_else(|| ChartError::UnknownChart(name.to_string()))?;

        let updated = instance.config.apply(patch);
        self.renderer.validate(&updated)?;
        instance.config = Arc::new(updated);
        instance.revision = self.next_revision();
        Ok(instance.config.clone())
    }

    pub async fn get(&self, name: &str) -> Option<ChartInstance> {
        self.charts.read().await.get(name).cloned()
    }

    pub async fn list(&self) -> Vec<ChartSummary> {
        let charts = self.charts.read().await;
        let mut summaries: Vec<ChartSummary> = charts
            .iter()
            .map(|(name, instance)| ChartSummary {
                name: name.clone(),
                chart_type: instance.config.chart_type,
                revision: instance.revision,
                rendered: instance.snapshot.is_some(),
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    pub async fn remove(&self, name: &str) -> bool {
        self.charts.write().await.remove(name).is_some()
    }

    /// Render the named chart through the admission gate and store the result.
    ///
    /// On failure the previous snapshot stays in place. A result rendered from a
    /// config that was replaced in the meantime is returned but not stored.
    pub async fn update(&self, name: &str) -> ChartResult<Arc<ChartSnapshot>> {
        let (config, revision) = {
            let charts = self.charts.read().await;
            let instance = charts
                .get(name)
                .ok_or_else(|| ChartError::UnknownChart(name.to_string()))?;
            (instance.config.clone(), instance.revision)
        };

        let outcome = self.gate.run(self.renderer.render(&config)).await;

        let mut charts = self.charts.write().await;
        let current = charts.get_mut(name).filter(|c| c.revision == revision);
        match outcome {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                if let Some(instance) = current {
                    instance.snapshot = Some(snapshot.clone());
                    instance.last_error = None;
                }
                Ok(snapshot)
            }
            Err(e) => {
                if let Some(instance) = current {
                    instance.last_error = Some(e.to_string());
                }
                Err(e)
            }
        }
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    fn next_revision(&self) -> u64 {
        self.last_revision.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::chart_service::RenderOptions;
    use crate::application::clock::FixedClock;
    use crate::application::metric_repository::MetricQueryService;
    use crate::domain::chart_config::Datapoint;
    use crate::domain::patch::FieldPatch;
    use crate::domain::query_result::{QueryResult, RawDatapoint, ResultSeries};
    use crate::domain::request::DataRequest;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::AtomicBool;

    struct SwitchableMetrics {
        healthy: AtomicBool,
    }

    #[async_trait]
    impl MetricQueryService for SwitchableMetrics {
        async fn query(&self, _request: &DataRequest) -> anyhow::Result<QueryResult> {
            if !self.healthy.load(Ordering::SeqCst) {
                anyhow::bail!("service down");
            }
            Ok(QueryResult {
                start_time_actual: 1000.0,
                end_time_actual: 2000.0,
                results: vec![ResultSeries {
                    metric: "m1".to_string(),
                    tags: None,
                    datapoints: Some(vec![
                        RawDatapoint::new(1000.0, Some(1.0)),
                        RawDatapoint::new(2000.0, Some(2.0)),
                    ]),
                }],
            })
        }
    }

    fn registry() -> (ChartRegistry, Arc<SwitchableMetrics>) {
        let metrics = Arc::new(SwitchableMetrics {
            healthy: AtomicBool::new(true),
        });
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        let renderer =
            ChartRenderer::new(metrics.clone(), Arc::new(clock), RenderOptions::default());
        (ChartRegistry::new(renderer, AdmissionGate::new(2)), metrics)
    }

    fn chart() -> ChartConfig {
        ChartConfig {
            datapoints: vec![Datapoint::metric("m1")],
            ..ChartConfig::default()
        }
    }

    #[tokio::test]
    async fn test_upsert_list_remove() {
        let (registry, _) = registry();
        assert_eq!(registry.upsert("cpu", chart()).await.unwrap(), 1);
        assert_eq!(registry.upsert("cpu", chart()).await.unwrap(), 2);
        assert_eq!(registry.upsert("alpha", chart()).await.unwrap(), 3);

        let names: Vec<String> = registry.list().await.into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["alpha", "cpu"]);

        assert!(registry.remove("cpu").await);
        assert!(!registry.remove("cpu").await);
        assert!(registry.get("cpu").await.is_none());
        assert_eq!(registry.upsert("cpu", chart()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_update_from_removed_chart_is_not_stored() {
        let (registry, _) = registry();
        registry.upsert("cpu", chart()).await.unwrap();

        let first = registry.gate().admit().await.unwrap();
        let second = registry.gate().admit().await.unwrap();
        let pending = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.update("cpu").await })
        };
        // Let the update read its revision and queue on the gate.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert!(registry.remove("cpu").await);
        registry.upsert("cpu", chart()).await.unwrap();
        drop(first);
        drop(second);

        assert!(pending.await.unwrap().is_ok());
        let instance = registry.get("cpu").await.unwrap();
        assert!(instance.snapshot.is_none());
        assert_eq!(instance.revision, 2);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let (registry, _) = registry();
        let mut broken = chart();
        broken.datapoints.push(Datapoint::default());
        assert!(matches!(
            registry.upsert("bad", broken).await,
            Err(ChartError::Configuration(_))
        ));
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_patch_replaces_config() {
        let (registry, _) = registry();
        registry.upsert("cpu", chart()).await.unwrap();
        let before = registry.get("cpu").await.unwrap().config;

        let patch = ChartConfigPatch {
            maxy: FieldPatch::Set(10.0),
            ..ChartConfigPatch::default()
        };
        let after = registry.patch("cpu", patch).await.unwrap();

        assert_eq!(after.maxy, Some(10.0));
        assert_eq!(before.maxy, None);
        assert_eq!(registry.get("cpu").await.unwrap().revision, 2);

        let missing = registry.patch("nope", ChartConfigPatch::default()).await;
        assert!(matches!(missing, Err(ChartError::UnknownChart(name)) if name == "nope"));
    }

    #[tokio::test]
    async fn test_failed_update_keeps_previous_snapshot() {
        let (registry, metrics) = registry();
        registry.upsert("cpu", chart()).await.unwrap();

        let first = registry.update("cpu").await.unwrap();
        assert_eq!(first.plots.len(), 1);

        metrics.healthy.store(false, Ordering::SeqCst);
        assert!(matches!(registry.update("cpu").await, Err(ChartError::Network(_))));

        let instance = registry.get("cpu").await.unwrap();
        assert!(Arc::ptr_eq(instance.snapshot.as_ref().unwrap(), &first));
        assert!(instance.last_error.unwrap().contains("service down"));
        assert_eq!(registry.gate().in_flight(), 0);
        assert!(registry.list().await[0].rendered);
    }

    #[tokio::test]
    async fn test_update_unknown_chart() {
        let (registry, _) = registry();
        assert!(matches!(registry.update("ghost").await, Err(ChartError::UnknownChart(_))));
    }
}
