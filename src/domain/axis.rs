// Axis labelling helpers shared with rendering adapters
use chrono::DateTime;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

struct Breakpoint {
    max_span_ms: i64,
    unit: TimeUnit,
    ticks: usize,
    pattern: &'static str,
    strftime: &'static str,
}

const HOUR_MS: i64 = 3_600_000;
const DAY_MS: i64 = 24 * HOUR_MS;

impl Breakpoint {
    const fn new(
        max_span_ms: i64,
        unit: TimeUnit,
        ticks: usize,
        pattern: &'static str,
        strftime: &'static str,
    ) -> Self {
        Self {
            max_span_ms,
            unit,
            ticks,
            pattern,
            strftime,
        }
    }
}

const X_LABEL_TABLE: [Breakpoint; 5] = [
    Breakpoint::new(HOUR_MS, TimeUnit::Minute, 6, "HH:mm:ss", "%H:%M:%S"),
    Breakpoint::new(DAY_MS, TimeUnit::Hour, 6, "HH:mm", "%H:%M"),
    Breakpoint::new(7 * DAY_MS, TimeUnit::Day, 7, "MM/DD HH:mm", "%m/%d %H:%M"),
    Breakpoint::new(31 * DAY_MS, TimeUnit::Week, 5, "MM/DD", "%m/%d"),
    Breakpoint::new(366 * DAY_MS, TimeUnit::Month, 6, "MMM DD", "%b %d"),
];

const YEAR_BREAKPOINT: Breakpoint =
    Breakpoint::new(i64::MAX, TimeUnit::Year, 5, "MMM YYYY", "%b %Y");

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XAxis {
    pub unit: TimeUnit,
    pub ticks: usize,
    /// Moment-style pattern for browser adapters.
    pub format: &'static str,
    pub tick_values: Vec<i64>,
    pub tick_labels: Vec<String>,
}

/// Choose tick unit, count and label format for the span `[start_ms, end_ms]`.
pub fn update_x_labels(start_ms: i64, end_ms: i64) -> XAxis {
    let (start_ms, end_ms) = (start_ms.min(end_ms), start_ms.max(end_ms));
    let span = end_ms - start_ms;
    let breakpoint = X_LABEL_TABLE
        .iter()
        .find(|b| span <= b.max_span_ms)
        .unwrap_or(&YEAR_BREAKPOINT);

    let intervals = breakpoint.ticks.saturating_sub(1).max(1) as i64;
    let tick_values: Vec<i64> = (0..breakpoint.ticks as i64)
        .map(|i| start_ms + span * i / intervals)
        .collect();
    let tick_labels = tick_values
        .iter()
        .map(|ms| {
            DateTime::from_timestamp_millis(*ms)
                .map(|t| t.format(breakpoint.strftime).to_string())
                .unwrap_or_default()
        })
        .collect();

    XAxis {
        unit: breakpoint.unit,
        ticks: breakpoint.ticks,
        format: breakpoint.pattern,
        tick_values,
        tick_labels,
    }
}

/// Blank out tick labels equal to the previous tick or to either bound's label.
pub fn dedupe_y_labels(labels: &[String], min_label: &str, max_label: &str) -> Vec<String> {
    let mut previous: Option<&str> = None;
    labels
        .iter()
        .map(|label| {
            let duplicate = previous == Some(label.as_str())
                || label.trim() == min_label.trim()
                || label.trim() == max_label.trim();
            previous = Some(label.as_str());
            if duplicate { String::new() } else { label.clone() }
        })
        .collect()
}
