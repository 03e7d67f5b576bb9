// Result normalizer - Query-service results to plot-ready series
use crate::domain::chart_config::Overlay;
use crate::domain::plot::{Plot, PlotInfoMap, PlotPoint};
use crate::domain::query_result::{QueryResult, ResultSeries, seconds_to_ms};
use std::collections::HashMap;

/// Fraction of the actual range a series may fall short of a bound before a
/// null point is inserted at that bound.
pub const DEFAULT_BOUNDARY_GAP_RATIO: f64 = 0.2;

#[derive(Debug, Clone, Copy)]
pub struct NormalizerOptions {
    pub boundary_gap_ratio: f64,
}

impl Default for NormalizerOptions {
    fn default() -> Self {
        Self {
            boundary_gap_ratio: DEFAULT_BOUNDARY_GAP_RATIO,
        }
    }
}

/// Series plots followed by overlay plots.
pub fn normalize(
    info: &PlotInfoMap,
    overlays: &[Overlay],
    result: &QueryResult,
    options: NormalizerOptions,
) -> Vec<Plot> {
    let mut plots = normalize_series(info, result, options);
    let overlay = overlay_plots(overlays, &plots, result);
    plots.extend(overlay);
    plots
}

pub fn normalize_series(
    info: &PlotInfoMap,
    result: &QueryResult,
    options: NormalizerOptions,
) -> Vec<Plot> {
    let start_ms = result.start_ms();
    let end_ms = result.end_ms();
    let tolerance = (end_ms - start_ms).abs() as f64 * options.boundary_gap_ratio;

    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    for series in &result.results {
        *occurrences.entry(series.metric.as_str()).or_default() += 1;
    }

    result
        .results
        .iter()
        .map(|series| {
            let points = series_points(series, start_ms, end_ms, tolerance);
            let mut plot = Plot::new(series.metric.clone(), points);
            if let Some(entry) = info.get(&series.metric) {
                plot.key = entry.legend.clone();
                plot.color = entry.color.clone();
                plot.fill = entry.fill;
            }
            if occurrences.get(series.metric.as_str()).copied().unwrap_or(0) > 1 {
                if let Some(suffix) = tag_suffix(series) {
                    plot.key = format!("{} ({})", plot.key, suffix);
                }
            }
            plot
        })
        .collect()
}

fn series_points(
    series: &ResultSeries,
    start_ms: i64,
    end_ms: i64,
    tolerance: f64,
) -> Vec<PlotPoint> {
    let raw = series.points();
    if raw.is_empty() {
        return vec![PlotPoint::new(start_ms, None), PlotPoint::new(end_ms, None)];
    }

    let mut points = Vec::with_capacity(raw.len() + 2);
    let first_ms = seconds_to_ms(raw[0].timestamp);
    if first_ms > start_ms && (first_ms - start_ms) as f64 > tolerance {
        points.push(PlotPoint::new(start_ms, None));
    }
    points.extend(
        raw.iter()
            .map(|p| PlotPoint::new(seconds_to_ms(p.timestamp), p.value)),
    );
    let last_ms = seconds_to_ms(raw[raw.len() - 1].timestamp);
    if last_ms < end_ms && (end_ms - last_ms) as f64 > tolerance {
        points.push(PlotPoint::new(end_ms, None));
    }
    points
}

fn tag_suffix(series: &ResultSeries) -> Option<String> {
    let tags = series.tags.as_ref()?;
    let values: Vec<&str> = tags.values().flatten().map(String::as_str).collect();
    (!values.is_empty()).then(|| values.join(", "))
}

/// Flat, initially disabled reference lines spanning the plotted x range.
pub fn overlay_plots(overlays: &[Overlay], series: &[Plot], result: &QueryResult) -> Vec<Plot> {
    let min_x = series.iter().filter_map(Plot::first_x).min().unwrap_or(result.start_ms());
    let max_x = series.iter().filter_map(Plot::last_x).max().unwrap_or(result.end_ms());

    overlays
        .iter()
        .flat_map(|overlay| {
            let many = overlay.values.len() > 1;
            overlay.values.iter().enumerate().map(move |(i, value)| {
                let key = if many {
                    format!("{}* {}", overlay.legend, i + 1)
                } else {
                    format!("{}*", overlay.legend)
                };
                let mut plot = Plot::new(
                    key,
                    vec![PlotPoint::new(min_x, Some(*value)), PlotPoint::new(max_x, Some(*value))],
                );
                plot.color = overlay.color.clone();
                plot.disabled = true;
                plot
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chart_config::{ChartConfig, Datapoint, Tags};
    use crate::domain::query_result::RawDatapoint;

    fn result(series: Vec<ResultSeries>) -> QueryResult {
        QueryResult {
            start_time_actual: 1000.0,
            end_time_actual: 2000.0,
            results: series,
        }
    }

    fn series(metric: &str, points: &[(f64, Option<f64>)]) -> ResultSeries {
        ResultSeries {
            metric: metric.to_string(),
            tags: None,
            datapoints: Some(points.iter().map(|(t, v)| RawDatapoint::new(*t, *v)).collect()),
        }
    }

    fn info() -> PlotInfoMap {
        PlotInfoMap::from_config(&ChartConfig {
            datapoints: vec![Datapoint {
                metric: Some("m1".to_string()),
                legend: Some("Series One".to_string()),
                color: Some("#f00".to_string()),
                ..Datapoint::default()
            }],
            ..ChartConfig::default()
        })
    }

    #[test]
    fn test_empty_series_gets_null_baseline() {
        let mut empty = series("m1", &[]);
        let plots = normalize_series(
            &info(),
            &result(vec![empty.clone()]),
            NormalizerOptions::default(),
        );
        assert_eq!(
            plots[0].values,
            vec![PlotPoint::new(1_000_000, None), PlotPoint::new(2_000_000, None)]
        );

        empty.datapoints = None;
        let plots = normalize_series(&info(), &result(vec![empty]), NormalizerOptions::default());
        assert_eq!(plots[0].values.len(), 2);
        assert!(plots[0].values.iter().all(|p| p.y.is_none()));
    }

    #[test]
    fn test_small_boundary_gaps_are_tolerated() {
        let data = result(vec![series("m1", &[(1100.0, Some(1.0)), (1900.0, Some(2.0))])]);
        let plots = normalize_series(&info(), &data, NormalizerOptions::default());

        assert_eq!(plots[0].key, "Series One");
        assert_eq!(plots[0].color.as_deref(), Some("#f00"));
        assert_eq!(
            plots[0].values,
            vec![PlotPoint::new(1_100_000, Some(1.0)), PlotPoint::new(1_900_000, Some(2.0))]
        );
    }

    #[test]
    fn test_large_boundary_gaps_get_null_points() {
        let data = result(vec![series("m1", &[(1300.0, Some(1.0)), (1500.0, None)])]);
        let plots = normalize_series(&info(), &data, NormalizerOptions::default());
        assert_eq!(
            plots[0].values,
            vec![
                PlotPoint::new(1_000_000, None),
                PlotPoint::new(1_300_000, Some(1.0)),
                PlotPoint::new(1_500_000, None),
                PlotPoint::new(2_000_000, None),
            ]
        );

        let strict = NormalizerOptions { boundary_gap_ratio: 0.5 };
        let plots = normalize_series(&info(), &data, strict);
        assert_eq!(plots[0].values.len(), 2);
    }

    #[test]
    fn test_duplicate_metrics_are_disambiguated_by_tags() {
        let tagged = |value: &str| {
            let mut tags = Tags::new();
            tags.insert("key".to_string(), vec![value.to_string()]);
            ResultSeries {
                tags: Some(tags),
                ..series("m1", &[(1000.0, Some(1.0))])
            }
        };
        let data = result(vec![tagged("Devices/a"), tagged("Devices/b"), series("m2", &[])]);
        let keys: Vec<String> = normalize_series(&info(), &data, NormalizerOptions::default())
            .into_iter()
            .map(|p| p.key)
            .collect();

        assert_eq!(keys, vec!["Series One (Devices/a)", "Series One (Devices/b)", "m2"]);
    }

    #[test]
    fn test_overlays_span_series_range() {
        let data = result(vec![series("m1", &[(1100.0, Some(1.0)), (1900.0, Some(2.0))])]);
        let overlays = vec![
            Overlay {
                legend: "SLA".to_string(),
                color: Some("#000".to_string()),
                values: vec![80.0],
            },
            Overlay {
                legend: "Band".to_string(),
                color: None,
                values: vec![10.0, 20.0],
            },
        ];
        let plots = normalize(&info(), &overlays, &data, NormalizerOptions::default());

        assert_eq!(plots.len(), 4);
        let keys: Vec<&str> = plots.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["Series One", "SLA*", "Band* 1", "Band* 2"]);
        assert!(plots[1..].iter().all(|p| p.disabled));
        assert_eq!(
            plots[1].values,
            vec![PlotPoint::new(1_100_000, Some(80.0)), PlotPoint::new(1_900_000, Some(80.0))]
        );
        assert_eq!(plots[1].color.as_deref(), Some("#000"));
    }

    #[test]
    fn test_normalize_is_repeatable() {
        let data = result(vec![series("m1", &[(1300.0, Some(1.0))])]);
        let map = info();
        let first = normalize(&map, &[], &data, NormalizerOptions::default());
        let second = normalize(&map, &[], &data, NormalizerOptions::default());
        assert_eq!(first, second);
    }
}
