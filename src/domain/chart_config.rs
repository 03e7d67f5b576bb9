// Chart configuration domain model
use super::error::ChartError;
use super::regression::Algorithm;
use super::time_spec::TimeValue;
use chrono::Duration;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Tag filters: tag name to one or more accepted values.
pub type Tags = BTreeMap<String, Vec<String>>;

pub const DEFAULT_BASE: f64 = 1000.0;
pub const DEFAULT_FORMAT: &str = "%6.2f";
pub const DEFAULT_PROJECTION_AGGREGATOR: &str = "max";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_threshold: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datapoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub rate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_options: Option<RateOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregator: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_tags",
        skip_serializing_if = "Option::is_none"
    )]
    pub tags: Option<Tags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legend: Option<String>,
}

impl Datapoint {
    pub fn metric(metric: &str) -> Self {
        Self {
            metric: Some(metric.to_string()),
            ..Self::default()
        }
    }

    /// Name the series is reported under, falling back to the metric.
    pub fn series_name(&self) -> Option<&str> {
        self.name.as_deref().or(self.metric.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Range {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<TimeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<TimeValue>,
}

impl Range {
    pub fn new(start: impl Into<TimeValue>, end: impl Into<TimeValue>) -> Self {
        Self {
            start: Some(start.into()),
            end: Some(end.into()),
        }
    }
}

/// Static reference line(s) drawn alongside queried series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    pub legend: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanUnit {
    #[serde(alias = "second", alias = "s")]
    Seconds,
    #[serde(alias = "minute", alias = "m")]
    Minutes,
    #[serde(alias = "hour", alias = "h")]
    Hours,
    #[serde(alias = "day", alias = "d")]
    Days,
    #[serde(alias = "week", alias = "w")]
    Weeks,
    #[serde(alias = "month")]
    Months,
    #[serde(alias = "year", alias = "y")]
    Years,
}

/// An amount of time written as `[amount, unit]`, e.g. `[30, "days"]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span(pub u32, pub SpanUnit);

impl Span {
    /// `None` when the span does not fit in a [`Duration`].
    pub fn duration(&self) -> Option<Duration> {
        let amount = i64::from(self.0);
        match self.1 {
            SpanUnit::Seconds => Duration::try_seconds(amount),
            SpanUnit::Minutes => Duration::try_minutes(amount),
            SpanUnit::Hours => Duration::try_hours(amount),
            SpanUnit::Days => Duration::try_days(amount),
            SpanUnit::Weeks => Duration::try_weeks(amount),
            SpanUnit::Months => Duration::try_days(amount * 30),
            SpanUnit::Years => Duration::try_days(amount * 365),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectionParameters {
    /// Polynomial order.
    #[serde(default, alias = "n", skip_serializing_if = "Option::is_none")]
    pub order: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionConfig {
    /// Target key, e.g. "cpu_ssCpuIdle". Matched against request metrics by its last `_` segment.
    pub metric: String,
    pub projection_algorithm: Algorithm,
    #[serde(default)]
    pub parameters: ProjectionParameters,
    pub past_data: Span,
    /// How far past the chart's end to extrapolate. Defaults to the displayed span.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub future_data: Option<Span>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl ProjectionConfig {
    pub fn target_token(&self) -> &str {
        self.metric
            .rsplit('_')
            .find(|segment| !segment.is_empty())
            .unwrap_or(&self.metric)
    }

    pub fn aggregator(&self) -> &str {
        self.aggregate_function
            .as_deref()
            .unwrap_or(DEFAULT_PROJECTION_AGGREGATOR)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChartType {
    #[default]
    Line,
    Area,
    StackedArea,
    Bar,
}

impl FromStr for ChartType {
    type Err = ChartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "line" => Ok(ChartType::Line),
            "area" => Ok(ChartType::Area),
            "stackedarea" | "stacked_area" => Ok(ChartType::StackedArea),
            "bar" => Ok(ChartType::Bar),
            _ => Err(ChartError::UnsupportedChartType(s.to_string())),
        }
    }
}

impl TryFrom<String> for ChartType {
    type Error = ChartError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChartType> for String {
    fn from(value: ChartType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartType::Line => write!(f, "line"),
            ChartType::Area => write!(f, "area"),
            ChartType::StackedArea => write!(f, "stackedarea"),
            ChartType::Bar => write!(f, "bar"),
        }
    }
}

/// How series are reconciled onto shared timestamps before rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignStrategy {
    None,
    Cull,
    Align,
}

impl ChartType {
    pub fn default_alignment(&self) -> AlignStrategy {
        match self {
            ChartType::Line => AlignStrategy::None,
            ChartType::Area | ChartType::StackedArea => AlignStrategy::Align,
            ChartType::Bar => AlignStrategy::Cull,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfig {
    #[serde(default, rename = "type")]
    pub chart_type: ChartType,
    #[serde(default)]
    pub datapoints: Vec<Datapoint>,
    #[serde(default)]
    pub range: Range,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downsample: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_tags",
        skip_serializing_if = "Option::is_none"
    )]
    pub tags: Option<Tags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returnset: Option<String>,
    #[serde(default)]
    pub overlays: Vec<Overlay>,
    #[serde(default)]
    pub projections: Vec<ProjectionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub miny: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<AlignStrategy>,
}

impl ChartConfig {
    pub fn alignment(&self) -> AlignStrategy {
        self.alignment
            .unwrap_or_else(|| self.chart_type.default_alignment())
    }

    /// Unit base, falling back to `default` when the chart sets none.
    pub fn base_or(&self, default: f64) -> f64 {
        self.base.unwrap_or(default)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// Tag values may be written as a single string or a list of strings.
pub fn deserialize_tags<'de, D>(deserializer: D) -> Result<Option<Tags>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, OneOrMany>> = Option::deserialize(deserializer)?;
    Ok(raw.map(|tags| {
        tags.into_iter()
            .map(|(key, values)| match values {
                OneOrMany::One(value) => (key, vec![value]),
                OneOrMany::Many(values) => (key, values),
            })
            .collect()
    }))
}
