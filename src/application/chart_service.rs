// Chart rendering service - Primary series plus projections, whole or streamed
use crate::application::admission::Admission;
use crate::application::clock::Clock;
use crate::application::metric_repository::MetricQueryService;
use crate::application::projection::ProjectionPlan;
use crate::application::request_builder;
use crate::application::result_normalizer::{self, NormalizerOptions};
use crate::application::series_aligner;
use crate::domain::axis::{self, XAxis};
use crate::domain::chart_config::{ChartConfig, DEFAULT_BASE, DEFAULT_FORMAT};
use crate::domain::downsample::DEFAULT_PROJECTION_DENSITY;
use crate::domain::error::{ChartError, ChartResult};
use crate::domain::plot::{Plot, PlotInfoMap};
use crate::domain::query_result::QueryResult;
use crate::domain::request::DataRequest;
use crate::domain::stats;
use crate::domain::units::{PreferredUnit, ValueFormatter};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

const NO_DATA: &str = "N/A";

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub boundary_gap_ratio: f64,
    pub projection_density: i64,
    pub default_format: String,
    pub default_base: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            boundary_gap_ratio: result_normalizer::DEFAULT_BOUNDARY_GAP_RATIO,
            projection_density: DEFAULT_PROJECTION_DENSITY,
            default_format: DEFAULT_FORMAT.to_string(),
            default_base: DEFAULT_BASE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FooterRow {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub min: String,
    pub max: String,
    pub avg: String,
    pub last: String,
}

/// Everything a rendering adapter needs for one chart update.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSnapshot {
    pub plots: Vec<Plot>,
    pub y_domain: (f64, f64),
    pub preferred_unit: PreferredUnit,
    pub footer: Vec<FooterRow>,
    pub x_axis: XAxis,
    pub request: DataRequest,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ChartEvent {
    /// The primary series landed.
    Series { snapshot: ChartSnapshot },
    /// The primary query failed; the chart stays up without data.
    #[serde(rename_all = "camelCase")]
    NoData { error: String },
    Projection { metric: String, plots: Vec<Plot> },
    #[serde(rename_all = "camelCase")]
    Complete { tasks: usize, duration_ms: u64 },
}

#[derive(Clone)]
pub struct ChartRenderer {
    repository: Arc<dyn MetricQueryService>,
    clock: Arc<dyn Clock>,
    options: RenderOptions,
}

impl ChartRenderer {
    pub fn new(
        repository: Arc<dyn MetricQueryService>,
        clock: Arc<dyn Clock>,
        options: RenderOptions,
    ) -> Self {
        Self {
            repository,
            clock,
            options,
        }
    }

    /// Reject configs whose request cannot be built.
    pub fn validate(&self, config: &ChartConfig) -> ChartResult<()> {
        request_builder::build(config, self.clock.now())?;
        Ok(())
    }

    /// Render the primary series and every projection, waiting for all of them.
    /// A failed projection only loses its own plots.
    pub async fn render(&self, config: &ChartConfig) -> ChartResult<ChartSnapshot> {
        let now = self.clock.now();
        let request = request_builder::build(config, now)?;
        let info = PlotInfoMap::from_config(config);
        let plans = self.plan_projections(config, &request, &info, now);

        let repository = self.repository.as_ref();
        let (primary, projected) = futures::join!(
            repository.query(&request),
            futures::future::join_all(plans.iter().map(|plan| plan.run(repository)))
        );

        let result = primary.map_err(|e| {
            tracing::warn!("Primary query failed: {:#}", e);
            ChartError::Network(format!("{:#}", e))
        })?;
        let mut snapshot = self.build_snapshot(config, &info, request, &result);
        for outcome in projected {
            match outcome {
                Ok(plots) => snapshot.plots.extend(plots),
                Err(e) => tracing::debug!("{}", e),
            }
        }
        Ok(snapshot)
    }

    /// Start the primary query and each projection as independent tasks.
    ///
    /// Events arrive as each task finishes, in no particular order, followed by a
    /// single `Complete` once every task has joined. `admission` is held until then.
    pub fn render_stream(
        &self,
        config: &ChartConfig,
        admission: Option<Admission>,
    ) -> ChartResult<mpsc::Receiver<ChartEvent>> {
        let now = self.clock.now();
        let request = request_builder::build(config, now)?;
        let info = PlotInfoMap::from_config(config);
        let plans = self.plan_projections(config, &request, &info, now);

        let (tx, rx) = mpsc::channel(16);
        let started = Instant::now();
        let mut tasks = JoinSet::new();

        {
            let tx = tx.clone();
            let renderer = self.clone();
            let config = config.clone();
            tasks.spawn(async move {
                let outcome = renderer.repository.query(&request).await;
                let event = match outcome {
                    Ok(result) => ChartEvent::Series {
                        snapshot: renderer.build_snapshot(&config, &info, request, &result),
                    },
                    Err(e) => {
                        tracing::warn!("Primary query failed: {:#}", e);
                        ChartEvent::NoData {
                            error: format!("{:#}", e),
                        }
                    }
                };
                let _ = tx.send(event).await;
            });
        }

        for plan in plans {
            let tx = tx.clone();
            let repository = self.repository.clone();
            tasks.spawn(async move {
                match plan.run(repository.as_ref()).await {
                    Ok(plots) => {
                        let event = ChartEvent::Projection {
                            metric: plan.metric().to_string(),
                            plots,
                        };
                        let _ = tx.send(event).await;
                    }
                    Err(e) => tracing::debug!("{}", e),
                }
            });
        }

        tokio::spawn(async move {
            let total = tasks.len();
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    tracing::warn!("Chart task panicked: {}", e);
                }
            }
            let complete = ChartEvent::Complete {
                tasks: total,
                duration_ms: started.elapsed().as_millis() as u64,
            };
            let _ = tx.send(complete).await;
            drop(admission);
        });

        Ok(rx)
    }

    fn plan_projections(
        &self,
        config: &ChartConfig,
        request: &DataRequest,
        info: &PlotInfoMap,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Vec<ProjectionPlan> {
        let density = self.options.projection_density;
        config
            .projections
            .iter()
            .filter_map(|projection| {
                match ProjectionPlan::new(config, request, projection, info, now, density) {
                    Ok(Some(plan)) => Some(plan),
                    Ok(None) => {
                        let metric = &projection.metric;
                        tracing::debug!("Projection '{}' matches no chart metric", metric);
                        None
                    }
                    Err(e) => {
                        tracing::debug!("{}", e);
                        None
                    }
                }
            })
            .collect()
    }

    /// Normalize, align and summarize one primary result.
    pub fn build_snapshot(
        &self,
        config: &ChartConfig,
        info: &PlotInfoMap,
        request: DataRequest,
        result: &QueryResult,
    ) -> ChartSnapshot {
        let options = NormalizerOptions {
            boundary_gap_ratio: self.options.boundary_gap_ratio,
        };
        let mut plots = result_normalizer::normalize_series(info, result, options);
        series_aligner::apply(config.alignment(), &mut plots);
        let overlays = result_normalizer::overlay_plots(&config.overlays, &plots, result);
        plots.extend(overlays);

        let y_domain = stats::calculate_y_domain(config.miny, config.maxy, &result.results);
        let format = config.format.as_deref().unwrap_or(&self.options.default_format);
        let base = config.base_or(self.options.default_base);
        let mut formatter = ValueFormatter::new(base, Some(format));
        let preferred_unit = formatter.set_preferred_y_unit(y_domain.1, config.miny, config.maxy);

        let footer = plots
            .iter()
            .filter(|plot| !plot.disabled && !plot.projection)
            .map(|plot| footer_row(plot, &formatter))
            .collect();

        ChartSnapshot {
            plots,
            y_domain,
            preferred_unit,
            footer,
            x_axis: axis::update_x_labels(result.start_ms(), result.end_ms()),
            request,
        }
    }
}

fn footer_row(plot: &Plot, formatter: &ValueFormatter) -> FooterRow {
    let cell = |value: Option<f64>| {
        value
            .map(|v| formatter.format_value(v, false))
            .unwrap_or_else(|| NO_DATA.to_string())
    };
    let summary = stats::summarize(plot);
    FooterRow {
        key: plot.key.clone(),
        color: plot.color.clone(),
        min: cell(summary.map(|s| s.min)),
        max: cell(summary.map(|s| s.max)),
        avg: cell(summary.map(|s| s.avg)),
        last: cell(summary.map(|s| s.last)),
    }
}
