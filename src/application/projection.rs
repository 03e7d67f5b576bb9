// Projection pipeline - Fetch history, fit a model, extrapolate past the chart end
use crate::application::metric_repository::MetricQueryService;
use crate::application::request_builder;
use crate::domain::chart_config::{ChartConfig, ProjectionConfig};
use crate::domain::downsample;
use crate::domain::error::{ChartError, ChartResult};
use crate::domain::plot::{Plot, PlotInfoMap};
use crate::domain::regression::{self, FittedModel};
use crate::domain::request::DataRequest;
use chrono::{DateTime, Utc};

/// Token used for sample spacing when the chart has no downsample.
const FALLBACK_STEP_TOKEN: &str = "10s-avg";

/// Upper bound on samples per projected series. Longer windows get a wider step.
pub const MAX_PROJECTION_POINTS: i64 = 10_000;

/// Everything a projection task needs, owned so it can run on its own task.
#[derive(Debug, Clone)]
pub struct ProjectionPlan {
    pub projection: ProjectionConfig,
    pub request: DataRequest,
    info: PlotInfoMap,
    start_sec: i64,
    end_sec: i64,
    step_sec: i64,
    miny: Option<f64>,
    maxy: Option<f64>,
}

impl ProjectionPlan {
    /// `Ok(None)` when no metric of the primary request matches the projection target.
    pub fn new(
        config: &ChartConfig,
        primary: &DataRequest,
        projection: &ProjectionConfig,
        info: &PlotInfoMap,
        now: DateTime<Utc>,
        density: i64,
    ) -> ChartResult<Option<Self>> {
        let failed = |reason: String| ChartError::Projection {
            metric: projection.metric.clone(),
            reason,
        };

        let request = request_builder::build_projection_request(primary, projection, now)
            .map_err(|e| failed(e.to_string()))?;
        let Some(request) = request else {
            return Ok(None);
        };
        let (chart_start, chart_end) =
            request_builder::resolve_range(&config.range, now).map_err(|e| failed(e.to_string()))?;

        let start = chart_end.max(now);
        let length = match projection.future_data {
            Some(span) => span.duration(),
            None => Some(chart_end - chart_start),
        };
        let end = length
            .and_then(|length| start.checked_add_signed(length))
            .ok_or_else(|| failed("futureData is out of range.".to_string()))?;
        let token = primary.downsample.as_deref().unwrap_or(FALLBACK_STEP_TOKEN);
        let step_sec = downsample::step_seconds(token, density).map_err(|e| failed(e.to_string()))?;
        let span_sec = (end.timestamp() - start.timestamp()).max(0);
        let step_sec = step_sec.max((span_sec + MAX_PROJECTION_POINTS - 1) / MAX_PROJECTION_POINTS);

        Ok(Some(Self {
            projection: projection.clone(),
            request,
            info: info.clone(),
            start_sec: start.timestamp(),
            end_sec: end.timestamp(),
            step_sec,
            miny: config.miny,
            maxy: config.maxy,
        }))
    }

    pub fn metric(&self) -> &str {
        &self.projection.metric
    }

    /// Query the historical window and turn each returned series into a projected plot.
    pub async fn run(&self, repository: &dyn MetricQueryService) -> ChartResult<Vec<Plot>> {
        let result = repository
            .query(&self.request)
            .await
            .map_err(|e| ChartError::Projection {
                metric: self.projection.metric.clone(),
                reason: format!("{:#}", e),
            })?;

        let plots = result
            .results
            .iter()
            .map(|series| {
                let (xs, ys): (Vec<f64>, Vec<f64>) = series
                    .points()
                    .iter()
                    .filter_map(|p| p.value.map(|v| (p.timestamp, v)))
                    .unzip();
                let model = regression::fit(
                    self.projection.projection_algorithm,
                    &xs,
                    &ys,
                    self.projection.parameters.order,
                );
                self.plot_for(&series.metric, model)
            })
            .collect();
        Ok(plots)
    }

    fn plot_for(&self, metric: &str, model: FittedModel) -> Plot {
        let info = self.info.get(metric);
        let key = match &self.projection.legend {
            Some(legend) => legend.clone(),
            None => format!(
                "{} (projected)",
                info.map(|i| i.legend.as_str()).unwrap_or(metric)
            ),
        };
        let values = regression::sample_projection(
            &model,
            self.start_sec,
            self.end_sec,
            self.step_sec,
            self.miny,
            self.maxy,
        );

        let mut plot = Plot::new(key, values);
        plot.color = self
            .projection
            .color
            .clone()
            .or_else(|| info.and_then(|i| i.color.clone()));
        plot.projection = true;
        plot.projection_model = Some(model);
        plot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chart_config::{Datapoint, ProjectionParameters, Range, Span, SpanUnit};
    use crate::domain::query_result::{QueryResult, RawDatapoint, ResultSeries};
    use crate::domain::regression::Algorithm;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;

    struct FakeHistory {
        result: Option<QueryResult>,
        seen: Mutex<Vec<DataRequest>>,
    }

    #[async_trait]
    impl MetricQueryService for FakeHistory {
        async fn query(&self, request: &DataRequest) -> anyhow::Result<QueryResult> {
            self.seen.lock().unwrap().push(request.clone());
            self.result
                .clone()
                .ok_or_else(|| anyhow::anyhow!("history unavailable"))
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn config() -> ChartConfig {
        ChartConfig {
            datapoints: vec![Datapoint {
                metric: Some("cpu_ssCpuIdle".to_string()),
                legend: Some("Idle".to_string()),
                color: Some("#0f0".to_string()),
                ..Datapoint::default()
            }],
            range: Range::new("1h-ago", "now"),
            ..ChartConfig::default()
        }
    }

    fn projection() -> ProjectionConfig {
        ProjectionConfig {
            metric: "cpu_ssCpuIdle".to_string(),
            projection_algorithm: Algorithm::Linear,
            parameters: ProjectionParameters::default(),
            past_data: Span(1, SpanUnit::Days),
            future_data: None,
            aggregate_function: None,
            legend: None,
            color: None,
        }
    }

    fn plan(config: &ChartConfig, projection: &ProjectionConfig) -> Option<ProjectionPlan> {
        let primary = request_builder::build(config, now()).unwrap();
        let info = PlotInfoMap::from_config(config);
        ProjectionPlan::new(config, &primary, projection, &info, now(), 10).unwrap()
    }

    fn history() -> QueryResult {
        let base = now().timestamp() as f64;
        QueryResult {
            start_time_actual: base - 300.0,
            end_time_actual: base,
            results: vec![ResultSeries {
                metric: "cpu_ssCpuIdle".to_string(),
                tags: None,
                datapoints: Some(vec![
                    RawDatapoint::new(base - 200.0, Some(10.0)),
                    RawDatapoint::new(base - 100.0, None),
                    RawDatapoint::new(base, Some(30.0)),
                ]),
            }],
        }
    }

    #[test]
    fn test_plan_window() {
        let hourly = plan(&config(), &projection()).unwrap();
        // One hour forward from now, sampled every 10s * 10.
        assert_eq!(hourly.start_sec, now().timestamp());
        assert_eq!(hourly.end_sec, now().timestamp() + 3600);
        assert_eq!(hourly.step_sec, 100);
        assert_eq!(hourly.request.metrics[0].aggregator.as_deref(), Some("max"));

        let mut target = projection();
        target.future_data = Some(Span(2, SpanUnit::Hours));
        let longer = plan(&config(), &target).unwrap();
        assert_eq!(longer.end_sec, now().timestamp() + 7200);
    }

    #[test]
    fn test_plan_caps_long_windows() {
        let mut target = projection();
        target.future_data = Some(Span(1000, SpanUnit::Years));
        let long = plan(&config(), &target).unwrap();

        let samples = (long.end_sec - long.start_sec) / long.step_sec + 1;
        assert!(samples <= MAX_PROJECTION_POINTS + 1, "{} samples", samples);
        assert!(long.step_sec > 100);
    }

    #[test]
    fn test_plan_rejects_out_of_range_spans() {
        let primary = request_builder::build(&config(), now()).unwrap();
        let info = PlotInfoMap::from_config(&config());

        let mut past = projection();
        past.past_data = Span(1_000_000, SpanUnit::Years);
        let err = ProjectionPlan::new(&config(), &primary, &past, &info, now(), 10).unwrap_err();
        assert!(matches!(err, ChartError::Projection { .. }));

        let mut future = projection();
        future.future_data = Some(Span(u32::MAX, SpanUnit::Years));
        let err = ProjectionPlan::new(&config(), &primary, &future, &info, now(), 10).unwrap_err();
        assert!(err.to_string().contains("futureData"), "{}", err);
    }

    #[test]
    fn test_plan_rejects_overflowing_downsample() {
        let mut chart = config();
        chart.downsample = Some("9999999999999999d-avg".to_string());
        let primary = request_builder::build(&chart, now()).unwrap();
        let info = PlotInfoMap::from_config(&chart);
        let err =
            ProjectionPlan::new(&chart, &primary, &projection(), &info, now(), 10).unwrap_err();
        assert!(matches!(err, ChartError::Projection { .. }));
    }

    #[test]
    fn test_plan_without_matching_metric() {
        let mut target = projection();
        target.metric = "disk_usedBlocks".to_string();
        assert!(plan(&config(), &target).is_none());
    }

    #[tokio::test]
    async fn test_run_fits_and_samples() {
        let repo = FakeHistory {
            result: Some(history()),
            seen: Mutex::new(Vec::new()),
        };
        let plan = plan(&config(), &projection()).unwrap();
        let plots = plan.run(&repo).await.unwrap();

        assert_eq!(plots.len(), 1);
        let plot = &plots[0];
        assert_eq!(plot.key, "Idle (projected)");
        assert_eq!(plot.color.as_deref(), Some("#0f0"));
        assert!(plot.projection);
        assert_eq!(plot.values.len(), 37);
        assert_eq!(plot.values[0].x, now().timestamp_millis());

        // Slope of 0.1 per second through (now, 30).
        let y = plot.values[1].y.unwrap();
        assert!((y - 40.0).abs() < 1e-6, "{}", y);
        assert_eq!(repo.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_drops_samples_outside_bounds() {
        let repo = FakeHistory {
            result: Some(history()),
            seen: Mutex::new(Vec::new()),
        };
        let mut chart = config();
        chart.maxy = Some(95.0);
        let plots = plan(&chart, &projection()).unwrap().run(&repo).await.unwrap();
        assert!(plots[0].values.iter().all(|p| p.y.unwrap() <= 95.0));
        assert_eq!(plots[0].values.len(), 7);
    }

    #[tokio::test]
    async fn test_run_failure_is_projection_error() {
        let repo = FakeHistory {
            result: None,
            seen: Mutex::new(Vec::new()),
        };
        let err = plan(&config(), &projection()).unwrap().run(&repo).await.unwrap_err();
        assert!(matches!(
            err,
            ChartError::Projection { ref metric, .. } if metric == "cpu_ssCpuIdle"
        ));
    }
}
