// Layered application configuration: config file, then PERF_CHARTS__* environment
use crate::application::chart_service::RenderOptions;
use crate::domain::chart_config::{ChartConfig, DEFAULT_BASE, DEFAULT_FORMAT};
use crate::domain::downsample::DEFAULT_PROJECTION_DENSITY;
use crate::application::result_normalizer::DEFAULT_BOUNDARY_GAP_RATIO;
use serde::Deserialize;
use std::time::Duration;

pub const CONFIG_FILE: &str = "config/perf-charts";
pub const ENV_PREFIX: &str = "PERF_CHARTS";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    pub query_service: QueryServiceSettings,
    #[serde(default)]
    pub charts: ChartSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryServiceSettings {
    pub base_url: String,
    #[serde(default = "default_query_path")]
    pub path: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl QueryServiceSettings {
    /// Base URL joined with the query path.
    pub fn endpoint(&self) -> String {
        let path = self.path.trim_start_matches('/');
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChartSettings {
    #[serde(default = "default_max_concurrent_updates")]
    pub max_concurrent_updates: usize,
    #[serde(default = "default_projection_density")]
    pub projection_density: i64,
    #[serde(default = "default_boundary_gap_ratio")]
    pub boundary_gap_ratio: f64,
    #[serde(default = "default_format")]
    pub default_format: String,
    #[serde(default = "default_base")]
    pub base: f64,
    /// Charts registered at startup.
    #[serde(default)]
    pub definitions: Vec<ChartDefinition>,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            max_concurrent_updates: default_max_concurrent_updates(),
            projection_density: default_projection_density(),
            boundary_gap_ratio: default_boundary_gap_ratio(),
            default_format: default_format(),
            base: default_base(),
            definitions: Vec::new(),
        }
    }
}

impl ChartSettings {
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            boundary_gap_ratio: self.boundary_gap_ratio,
            projection_density: self.projection_density,
            default_format: self.default_format.clone(),
            default_base: self.base,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChartDefinition {
    pub name: String,
    pub config: ChartConfig,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_query_path() -> String {
    "/api/performance/query".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent_updates() -> usize {
    4
}

fn default_projection_density() -> i64 {
    DEFAULT_PROJECTION_DENSITY
}

fn default_boundary_gap_ratio() -> f64 {
    DEFAULT_BOUNDARY_GAP_RATIO
}

fn default_format() -> String {
    DEFAULT_FORMAT.to_string()
}

fn default_base() -> f64 {
    DEFAULT_BASE
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
}

pub fn load_app_config() -> anyhow::Result<AppConfig> {
    load_app_config_with(config::File::with_name(CONFIG_FILE).required(false), environment())
}

fn load_app_config_with<F>(file: F, environment: config::Environment) -> anyhow::Result<AppConfig>
where
    F: config::Source + Send + Sync + 'static,
{
    let settings = config::Config::builder()
        .add_source(file)
        .add_source(environment)
        .build()?;

    Ok(settings.try_deserialize()?)
}
