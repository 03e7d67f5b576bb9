// Error taxonomy for chart construction and rendering
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TimeSpecError {
    #[error("Empty time expression.")]
    Empty,
    #[error("Relative time expression '{0}' must look like '<n><s|m|h|d>-ago'.")]
    MalformedRelative(String),
    #[error("Unrecognized time expression '{0}'.")]
    Unrecognized(String),
    #[error("Time value {0} is out of range.")]
    OutOfRange(i64),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FormatError {
    #[error("Format string '{0}' has no conversion.")]
    NoConversion(String),
    #[error("Format string '{format}' is invalid at byte {position}.")]
    Invalid { format: String, position: usize },
    #[error("Unsupported conversion '%{conversion}' in '{format}'.")]
    UnsupportedConversion { format: String, conversion: char },
}

/// Fatal, synchronous problems with a chart configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Datapoint must have a metric or a name: {datapoint}")]
    MissingMetric { datapoint: String },
    #[error("Invalid range {bound}: {source}")]
    InvalidTime {
        bound: &'static str,
        #[source]
        source: TimeSpecError,
    },
    #[error("Invalid downsample token '{0}'.")]
    InvalidDownsample(String),
    #[error("Projection {field} is out of range.")]
    SpanOutOfRange { field: &'static str },
    #[error("Invalid chart config: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ChartError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("Chart '{0}' is not registered.")]
    UnknownChart(String),
    #[error("Chart type '{0}' is not supported.")]
    UnsupportedChartType(String),
    #[error("Metric query failed: {0}")]
    Network(String),
    #[error("Projection '{metric}' failed: {reason}")]
    Projection { metric: String, reason: String },
    #[error("Chart update queue is closed.")]
    Unavailable,
}

pub type ChartResult<T> = Result<T, ChartError>;
