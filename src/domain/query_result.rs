// Query-service response model
use super::chart_config::{Tags, deserialize_tags};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Seconds since epoch actually covered by the service.
    pub start_time_actual: f64,
    pub end_time_actual: f64,
    #[serde(default)]
    pub results: Vec<ResultSeries>,
}

impl QueryResult {
    pub fn start_ms(&self) -> i64 {
        seconds_to_ms(self.start_time_actual)
    }

    pub fn end_ms(&self) -> i64 {
        seconds_to_ms(self.end_time_actual)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSeries {
    pub metric: String,
    #[serde(
        default,
        deserialize_with = "deserialize_tags",
        skip_serializing_if = "Option::is_none"
    )]
    pub tags: Option<Tags>,
    #[serde(default)]
    pub datapoints: Option<Vec<RawDatapoint>>,
}

impl ResultSeries {
    pub fn points(&self) -> &[RawDatapoint] {
        self.datapoints.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDatapoint {
    /// Seconds since epoch.
    pub timestamp: f64,
    /// `None` for `null`, `"NaN"` or any other non-numeric value.
    #[serde(default, deserialize_with = "deserialize_lenient_value")]
    pub value: Option<f64>,
}

impl RawDatapoint {
    pub fn new(timestamp: f64, value: Option<f64>) -> Self {
        Self { timestamp, value }
    }
}

pub fn seconds_to_ms(seconds: f64) -> i64 {
    (seconds * 1000.0).round() as i64
}

fn deserialize_lenient_value<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(raw.as_f64().filter(|v| v.is_finite()))
}
