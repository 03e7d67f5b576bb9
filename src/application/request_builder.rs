// Request builder - Chart configs to query-service requests
use crate::domain::chart_config::{ChartConfig, Datapoint, ProjectionConfig, Range};
use crate::domain::downsample;
use crate::domain::error::ConfigurationError;
use crate::domain::request::{DataRequest, MetricQuery};
use crate::domain::time_spec::{self, TimeValue};
use chrono::{DateTime, Utc};

pub const DEFAULT_START: &str = "1h-ago";
pub const DEFAULT_END: &str = "now";

const RPN_PREFIX: &str = "rpn:";
const HIDDEN_SUFFIX: &str = "-rpn";

/// Build the request for a chart. Any invalid datapoint fails the whole request.
pub fn build(config: &ChartConfig, now: DateTime<Utc>) -> Result<DataRequest, ConfigurationError> {
    let downsample = match &config.downsample {
        Some(token) => Some(token.clone()),
        None => {
            let (start, end) = resolve_range(&config.range, now)?;
            downsample::select((end - start).num_milliseconds()).map(str::to_string)
        }
    };

    let mut metrics = Vec::with_capacity(config.datapoints.len());
    for dp in &config.datapoints {
        append_metric(&mut metrics, dp)?;
    }

    Ok(DataRequest {
        start: config.range.start.clone(),
        end: config.range.end.clone(),
        downsample,
        tags: config.tags.clone(),
        returnset: config.returnset.clone(),
        series: true,
        metrics,
    })
}

/// Absolute bounds of a range, defaulting to the last hour.
pub fn resolve_range(
    range: &Range,
    now: DateTime<Utc>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ConfigurationError> {
    let default_start = TimeValue::from(DEFAULT_START);
    let default_end = TimeValue::from(DEFAULT_END);

    let start = time_spec::parse(range.start.as_ref().unwrap_or(&default_start), now)
        .map_err(|source| ConfigurationError::InvalidTime { bound: "start", source })?;
    let end = time_spec::parse(range.end.as_ref().unwrap_or(&default_end), now)
        .map_err(|source| ConfigurationError::InvalidTime { bound: "end", source })?;
    Ok((start, end))
}

fn append_metric(metrics: &mut Vec<MetricQuery>, dp: &Datapoint) -> Result<(), ConfigurationError> {
    let name = dp.series_name().ok_or_else(|| ConfigurationError::MissingMetric {
        datapoint: serde_json::to_string(dp).unwrap_or_else(|_| format!("{:?}", dp)),
    })?;
    let suppressed = (dp.emit == Some(false)).then_some(false);

    let mut query = MetricQuery {
        metric: dp.metric.clone(),
        name: Some(name.to_string()),
        rate: dp.rate,
        rate_options: dp.rate_options.clone(),
        aggregator: dp.aggregator.clone(),
        tags: dp.tags.clone(),
        emit: suppressed,
        expression: None,
    };

    let Some(expression) = &dp.expression else {
        metrics.push(query);
        return Ok(());
    };

    // A name-only datapoint is a pure expression: there is no source series to hide.
    let expression = if dp.metric.is_some() {
        let hidden = format!("{}{}", name, HIDDEN_SUFFIX);
        let rewritten = rewrite_expression(expression, &hidden);
        query.name = Some(hidden);
        query.emit = Some(false);
        metrics.push(query);
        rewritten
    } else {
        expression.clone()
    };

    metrics.push(MetricQuery {
        name: Some(name.to_string()),
        expression: Some(expression),
        emit: suppressed,
        ..MetricQuery::default()
    });
    Ok(())
}

/// Make an RPN expression operate on `reference` first.
pub fn rewrite_expression(expression: &str, reference: &str) -> String {
    let body = expression
        .trim()
        .strip_prefix(RPN_PREFIX)
        .unwrap_or(expression.trim())
        .trim();
    if body.is_empty() {
        format!("{}{}", RPN_PREFIX, reference)
    } else {
        format!("{}{},{}", RPN_PREFIX, reference, body)
    }
}

/// Build the historical query backing a projection, or `None` when no
/// request metric matches the projection's target.
pub fn build_projection_request(
    request: &DataRequest,
    projection: &ProjectionConfig,
    now: DateTime<Utc>,
) -> Result<Option<DataRequest>, ConfigurationError> {
    let token = projection.target_token();
    let metrics: Vec<MetricQuery> = request
        .metrics
        .iter()
        .filter(|m| m.expression.is_none())
        .filter(|m| {
            [m.metric.as_deref(), m.name.as_deref()]
                .into_iter()
                .flatten()
                .any(|id| id.contains(token))
        })
        .map(|m| MetricQuery {
            aggregator: Some(projection.aggregator().to_string()),
            emit: Some(true),
            ..m.clone()
        })
        .collect();
    if metrics.is_empty() {
        return Ok(None);
    }

    let start = projection
        .past_data
        .duration()
        .and_then(|past| now.checked_sub_signed(past))
        .ok_or(ConfigurationError::SpanOutOfRange { field: "pastData" })?;
    Ok(Some(DataRequest {
        start: Some(TimeValue::Epoch(start.timestamp_millis())),
        end: Some(TimeValue::Epoch(now.timestamp_millis())),
        downsample: downsample::select((now - start).num_milliseconds()).map(str::to_string),
        tags: request.tags.clone(),
        returnset: request.returnset.clone(),
        series: true,
        metrics,
    }))
}
