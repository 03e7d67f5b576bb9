// Regression models used for trend projections
use super::plot::PlotPoint;
use serde::{Deserialize, Serialize};

pub const DEFAULT_POLYNOMIAL_ORDER: usize = 2;

const PIVOT_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Linear,
    Polynomial,
    Exponential,
    Logarithmic,
    Power,
    #[serde(alias = "lastValue", alias = "last_value")]
    LastValue,
}

/// A fitted curve. `evaluate` takes x in the same unit the model was fitted on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "model", rename_all = "lowercase")]
pub enum FittedModel {
    Constant {
        value: f64,
    },
    Linear {
        slope: f64,
        intercept: f64,
    },
    /// Σ coefficients[i] * u^i with u = (x - offset) / scale.
    Polynomial {
        coefficients: Vec<f64>,
        offset: f64,
        scale: f64,
    },
    /// a * e^(b * (x - offset))
    Exponential {
        a: f64,
        b: f64,
        offset: f64,
    },
    /// a + b * ln(x)
    Logarithmic {
        a: f64,
        b: f64,
    },
    /// a * x^b
    Power {
        a: f64,
        b: f64,
    },
}

impl FittedModel {
    pub const ZERO: FittedModel = FittedModel::Constant { value: 0.0 };

    pub fn evaluate(&self, x: f64) -> f64 {
        match self {
            FittedModel::Constant { value } => *value,
            FittedModel::Linear { slope, intercept } => slope * x + intercept,
            FittedModel::Polynomial {
                coefficients,
                offset,
                scale,
            } => {
                let u = (x - offset) / scale;
                // Horner's rule, highest order first.
                coefficients.iter().rev().fold(0.0, |acc, c| acc * u + c)
            }
            FittedModel::Exponential { a, b, offset } => a * (b * (x - offset)).exp(),
            FittedModel::Logarithmic { a, b } => a + b * x.ln(),
            FittedModel::Power { a, b } => a * x.powf(*b),
        }
    }

    pub fn as_fn(&self) -> impl Fn(f64) -> f64 + '_ {
        move |x| self.evaluate(x)
    }
}

/// Fit `algorithm` to the (x, y) pairs. Non-finite pairs are ignored and an
/// empty dataset always yields the zero function.
pub fn fit(algorithm: Algorithm, xs: &[f64], ys: &[f64], order: Option<usize>) -> FittedModel {
    let points: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (*x, *y))
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    if points.is_empty() {
        return FittedModel::ZERO;
    }

    let model = match algorithm {
        Algorithm::Linear => fit_linear(&points),
        Algorithm::Polynomial => {
            fit_polynomial(&points, order.unwrap_or(DEFAULT_POLYNOMIAL_ORDER))
        }
        Algorithm::Exponential => fit_exponential(&points),
        Algorithm::Logarithmic => fit_logarithmic(&points),
        Algorithm::Power => fit_power(&points),
        Algorithm::LastValue => points.last().map(|(_, y)| FittedModel::Constant { value: *y }),
    };
    model.unwrap_or(FittedModel::ZERO)
}

/// Ordinary least squares over centered sums; a vertical point cloud gets a
/// flat line through the mean.
fn least_squares(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;
    let (sxy, sxx) = points.iter().fold((0.0, 0.0), |(sxy, sxx), (x, y)| {
        let dx = x - mean_x;
        (sxy + dx * (y - mean_y), sxx + dx * dx)
    });

    if sxx <= f64::EPSILON * mean_x.abs().max(1.0) {
        return Some((0.0, mean_y));
    }
    let slope = sxy / sxx;
    Some((slope, mean_y - slope * mean_x))
}

fn fit_linear(points: &[(f64, f64)]) -> Option<FittedModel> {
    least_squares(points).map(|(slope, intercept)| FittedModel::Linear { slope, intercept })
}

fn fit_polynomial(points: &[(f64, f64)], order: usize) -> Option<FittedModel> {
    let n = points.len() as f64;
    let offset = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let spread = points
        .iter()
        .map(|(x, _)| (x - offset).abs())
        .fold(0.0_f64, f64::max);
    let scale = if spread > 0.0 { spread } else { 1.0 };

    // More coefficients than distinct samples leaves the system singular.
    let order = order.min(points.len().saturating_sub(1));
    let size = order + 1;

    let mut matrix = vec![vec![0.0; size]; size];
    let mut rhs = vec![0.0; size];
    for (x, y) in points {
        let u = (x - offset) / scale;
        let powers: Vec<f64> = (0..2 * size).map(|k| u.powi(k as i32)).collect();
        for row in 0..size {
            for col in 0..size {
                matrix[row][col] += powers[row + col];
            }
            rhs[row] += powers[row] * y;
        }
    }

    match gaussian_elimination(matrix, rhs) {
        Some(coefficients) => Some(FittedModel::Polynomial {
            coefficients,
            offset,
            scale,
        }),
        None => fit_linear(points),
    }
}

/// Solve `matrix * x = rhs` with partial pivoting. `None` when singular.
fn gaussian_elimination(mut matrix: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Option<Vec<f64>> {
    let size = rhs.len();
    for col in 0..size {
        let pivot = (col..size).max_by(|a, b| {
            matrix[*a][col]
                .abs()
                .total_cmp(&matrix[*b][col].abs())
        })?;
        if matrix[pivot][col].abs() < PIVOT_EPSILON {
            return None;
        }
        matrix.swap(col, pivot);
        rhs.swap(col, pivot);

        for row in col + 1..size {
            let factor = matrix[row][col] / matrix[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..size {
                matrix[row][k] -= factor * matrix[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut solution = vec![0.0; size];
    for row in (0..size).rev() {
        let tail: f64 = (row + 1..size).map(|k| matrix[row][k] * solution[k]).sum();
        solution[row] = (rhs[row] - tail) / matrix[row][row];
    }
    solution.iter().all(|c| c.is_finite()).then_some(solution)
}

fn fit_exponential(points: &[(f64, f64)]) -> Option<FittedModel> {
    let positive: Vec<(f64, f64)> = points.iter().filter(|(_, y)| *y > 0.0).copied().collect();
    let offset = positive.first()?.0;
    let logged: Vec<(f64, f64)> = positive.iter().map(|(x, y)| (x - offset, y.ln())).collect();
    least_squares(&logged).map(|(b, ln_a)| FittedModel::Exponential {
        a: ln_a.exp(),
        b,
        offset,
    })
}

fn fit_logarithmic(points: &[(f64, f64)]) -> Option<FittedModel> {
    let logged: Vec<(f64, f64)> = points
        .iter()
        .filter(|(x, _)| *x > 0.0)
        .map(|(x, y)| (x.ln(), *y))
        .collect();
    least_squares(&logged).map(|(b, a)| FittedModel::Logarithmic { a, b })
}

fn fit_power(points: &[(f64, f64)]) -> Option<FittedModel> {
    let logged: Vec<(f64, f64)> = points
        .iter()
        .filter(|(x, y)| *x > 0.0 && *y > 0.0)
        .map(|(x, y)| (x.ln(), y.ln()))
        .collect();
    least_squares(&logged).map(|(b, ln_a)| FittedModel::Power { a: ln_a.exp(), b })
}

/// Evaluate `model` every `step_sec` seconds over `[start_sec, end_sec]`.
///
/// Samples that are not finite or fall outside `[miny, maxy]` are dropped rather
/// than clamped, so a projection never draws along an axis bound.
pub fn sample_projection(
    model: &FittedModel,
    start_sec: i64,
    end_sec: i64,
    step_sec: i64,
    miny: Option<f64>,
    maxy: Option<f64>,
) -> Vec<PlotPoint> {
    let step = step_sec.max(1) as usize;
    (start_sec..=end_sec)
        .step_by(step)
        .filter_map(|sec| {
            let y = model.evaluate(sec as f64);
            let in_bounds = y.is_finite()
                && miny.is_none_or(|min| y >= min)
                && maxy.is_none_or(|max| y <= max);
            in_bounds.then(|| PlotPoint::new(sec * 1000, Some(y)))
        })
        .collect()
}
