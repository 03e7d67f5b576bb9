// Series aligner - Reconcile plots onto shared timestamps for stacked rendering
use crate::domain::chart_config::AlignStrategy;
use crate::domain::plot::{Plot, PlotPoint};
use std::collections::{BTreeSet, HashSet};

pub fn apply(strategy: AlignStrategy, plots: &mut [Plot]) {
    match strategy {
        AlignStrategy::None => {}
        AlignStrategy::Cull => cull(plots),
        AlignStrategy::Align => align(plots),
    }
}

/// Keep only the timestamps present in every plot.
pub fn cull(plots: &mut [Plot]) {
    if plots.len() < 2 {
        return;
    }
    let mut shared: HashSet<i64> = plots[0].values.iter().map(|p| p.x).collect();
    for plot in &plots[1..] {
        let xs: HashSet<i64> = plot.values.iter().map(|p| p.x).collect();
        shared.retain(|x| xs.contains(x));
    }
    for plot in plots.iter_mut() {
        plot.values.retain(|p| shared.contains(&p.x));
    }
}

/// Step-hold every plot onto the union of timestamps, starting at the latest
/// first timestamp so no plot is extended backwards.
///
/// Each output point carries the most recent non-null value at or before its
/// timestamp, so every plot ends up with the same x values.
pub fn align(plots: &mut [Plot]) {
    if plots.len() < 2 {
        return;
    }
    let Some(floor) = plots.iter().filter_map(Plot::first_x).max() else {
        return;
    };
    let timeline: BTreeSet<i64> = plots
        .iter()
        .flat_map(|plot| plot.values.iter().map(|p| p.x))
        .filter(|x| *x >= floor)
        .collect();

    for plot in plots.iter_mut() {
        plot.values = hold(&plot.values, &timeline);
    }
}

fn hold(values: &[PlotPoint], timeline: &BTreeSet<i64>) -> Vec<PlotPoint> {
    let mut source = values.iter().peekable();
    let mut held = None;
    timeline
        .iter()
        .map(|&x| {
            while let Some(point) = source.next_if(|p| p.x <= x) {
                if point.y.is_some() {
                    held = point.y;
                }
            }
            PlotPoint::new(x, held)
        })
        .collect()
}
