// Engineering-notation unit scaling for axis and footer values
use super::chart_config::{DEFAULT_BASE, DEFAULT_FORMAT};
use super::printf::NumberFormat;
use serde::Serialize;

/// Symbols for exponents -8..=8 of the unit base.
pub const UNIT_SYMBOLS: [&str; 17] = [
    "y", "z", "a", "f", "p", "n", "u", "m", "", "k", "M", "G", "T", "P", "E", "Z", "Y",
];

const MIN_EXPONENT: i32 = -8;
const MAX_EXPONENT: i32 = 8;

pub fn unit_exponent(value: f64, base: f64) -> i32 {
    if value == 0.0 || !value.is_finite() {
        return 0;
    }
    let exponent = (value.abs().ln() / base.ln()).floor();
    (exponent as i32).clamp(MIN_EXPONENT, MAX_EXPONENT)
}

pub fn unit_symbol(exponent: i32) -> &'static str {
    let index = exponent.clamp(MIN_EXPONENT, MAX_EXPONENT) - MIN_EXPONENT;
    UNIT_SYMBOLS[index as usize]
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PreferredUnit {
    pub exponent: i32,
    pub symbol: &'static str,
}

impl PreferredUnit {
    pub fn from_exponent(exponent: i32) -> Self {
        let exponent = exponent.clamp(MIN_EXPONENT, MAX_EXPONENT);
        Self {
            exponent,
            symbol: unit_symbol(exponent),
        }
    }
}

/// Formats values in a chart's preferred engineering unit.
#[derive(Debug, Clone)]
pub struct ValueFormatter {
    base: f64,
    format: NumberFormat,
    preferred: PreferredUnit,
}

impl ValueFormatter {
    /// Build a formatter; an unusable format string falls back to `%6.2f` with a warning.
    pub fn new(base: f64, format: Option<&str>) -> Self {
        let base = if base > 1.0 { base } else { DEFAULT_BASE };
        let format = match format.map(NumberFormat::parse) {
            Some(Ok(parsed)) => parsed,
            Some(Err(e)) => {
                tracing::warn!("{}; falling back to '{}'", e, DEFAULT_FORMAT);
                NumberFormat::default()
            }
            None => NumberFormat::default(),
        };
        Self {
            base,
            format,
            preferred: PreferredUnit::from_exponent(0),
        }
    }

    pub fn preferred_unit(&self) -> PreferredUnit {
        self.preferred
    }

    /// Pick the unit from the chart's effective maximum, clamped to the configured bounds.
    pub fn set_preferred_y_unit(
        &mut self,
        max: f64,
        miny: Option<f64>,
        maxy: Option<f64>,
    ) -> PreferredUnit {
        let mut value = max;
        if let Some(upper) = maxy {
            if value > upper {
                value = upper;
            }
        }
        if let Some(lower) = miny {
            if value < lower {
                value = lower;
            }
        }
        self.preferred = PreferredUnit::from_exponent(unit_exponent(value, self.base));
        self.preferred
    }

    pub fn format_value(&self, value: f64, ignore_preferred: bool) -> String {
        let unit = if ignore_preferred {
            PreferredUnit::from_exponent(unit_exponent(value, self.base))
        } else {
            self.preferred
        };
        let scaled = value / self.base.powi(unit.exponent);
        format!("{}{}", self.format.format(scaled), unit.symbol)
    }
}

impl Default for ValueFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_BASE, None)
    }
}
