// Plot series handed to rendering adapters
use super::chart_config::ChartConfig;
use super::regression::FittedModel;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlotPoint {
    /// Milliseconds since epoch.
    pub x: i64,
    pub y: Option<f64>,
}

impl PlotPoint {
    pub fn new(x: i64, y: Option<f64>) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plot {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub fill: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub projection: bool,
    #[serde(rename = "projectionModel", skip_serializing_if = "Option::is_none")]
    pub projection_model: Option<FittedModel>,
    pub values: Vec<PlotPoint>,
}

impl Plot {
    pub fn new(key: impl Into<String>, values: Vec<PlotPoint>) -> Self {
        Self {
            key: key.into(),
            color: None,
            fill: false,
            disabled: false,
            projection: false,
            projection_model: None,
            values,
        }
    }

    pub fn first_x(&self) -> Option<i64> {
        self.values.first().map(|p| p.x)
    }

    pub fn last_x(&self) -> Option<i64> {
        self.values.last().map(|p| p.x)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlotInfo {
    pub legend: String,
    pub color: Option<String>,
    pub fill: bool,
}

/// Lookup from a series' metric or name to its display attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotInfoMap {
    entries: HashMap<String, PlotInfo>,
}

impl PlotInfoMap {
    pub fn from_config(config: &ChartConfig) -> Self {
        let mut entries = HashMap::new();
        for dp in &config.datapoints {
            let Some(name) = dp.series_name() else {
                continue;
            };
            let info = PlotInfo {
                legend: dp.legend.clone().unwrap_or_else(|| name.to_string()),
                color: dp.color.clone(),
                fill: dp.fill.unwrap_or(false),
            };
            // Names win over metrics: a result is reported under its request name.
            if let Some(metric) = &dp.metric {
                entries.entry(metric.clone()).or_insert_with(|| info.clone());
            }
            entries.insert(name.to_string(), info);
        }
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&PlotInfo> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
