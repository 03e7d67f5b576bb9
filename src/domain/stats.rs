// Summary statistics over plots and raw query results
use super::plot::Plot;
use super::query_result::ResultSeries;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub last: f64,
}

/// Min/max/avg/last over the non-null values. `None` means the plot has no data.
pub fn summarize(plot: &Plot) -> Option<SeriesStats> {
    let mut values = plot.values.iter().filter_map(|p| p.y);
    let first = values.next()?;

    let (min, max, sum, count, last) = values.fold(
        (first, first, first, 1usize, first),
        |(min, max, sum, count, _), y| (min.min(y), max.max(y), sum + y, count + 1, y),
    );
    Some(SeriesStats {
        min,
        max,
        avg: sum / count as f64,
        last,
    })
}

fn raw_values<'a>(data: &'a [ResultSeries], non_zero: bool) -> impl Iterator<Item = f64> + 'a {
    data.iter()
        .flat_map(|series| series.points())
        .filter_map(|p| p.value)
        .filter(move |v| !non_zero || *v != 0.0)
}

/// Largest raw value across all series; 0 when nothing qualifies.
pub fn calculate_results_max(data: &[ResultSeries], non_zero: bool) -> f64 {
    let max = raw_values(data, non_zero).fold(f64::NEG_INFINITY, f64::max);
    if max.is_finite() { max } else { 0.0 }
}

/// Smallest raw value across all series; 0 when nothing qualifies.
pub fn calculate_results_min(data: &[ResultSeries], non_zero: bool) -> f64 {
    let min = raw_values(data, non_zero).fold(f64::INFINITY, f64::min);
    if min.is_finite() { min } else { 0.0 }
}

/// Y axis bounds: configured bounds win, the rest come from the data.
pub fn calculate_y_domain(
    miny: Option<f64>,
    maxy: Option<f64>,
    data: &[ResultSeries],
) -> (f64, f64) {
    let min = miny.unwrap_or_else(|| calculate_results_min(data, false));
    let mut max = maxy.unwrap_or_else(|| calculate_results_max(data, false));

    if min == 0.0 && max == 0.0 {
        return (0.0, 1.0);
    }
    if min == max {
        max += max.abs() * 0.1;
    }
    (min, max)
}
