// Minimal printf-style number formatting ("%6.2f", "%.3e", "%d", ...)
use super::error::FormatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conversion {
    Fixed,
    Exponent { upper: bool },
    General { upper: bool },
    Integer,
    Plain,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Flags {
    left: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alternate: bool,
}

/// A parsed format string holding exactly one conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberFormat {
    prefix: String,
    suffix: String,
    flags: Flags,
    width: Option<usize>,
    precision: Option<usize>,
    conversion: Conversion,
}

impl NumberFormat {
    pub fn parse(format: &str) -> Result<Self, FormatError> {
        let invalid = |position: usize| FormatError::Invalid {
            format: format.to_string(),
            position,
        };

        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut parsed: Option<(Flags, Option<usize>, Option<usize>, Conversion)> = None;
        let mut chars = format.char_indices().peekable();

        while let Some((position, c)) = chars.next() {
            let literal = if parsed.is_some() { &mut suffix } else { &mut prefix };
            if c != '%' {
                literal.push(c);
                continue;
            }
            if chars.next_if(|(_, next)| *next == '%').is_some() {
                literal.push('%');
                continue;
            }
            if parsed.is_some() {
                return Err(invalid(position));
            }

            let mut flags = Flags::default();
            while let Some((_, flag)) = chars.next_if(|(_, f)| "-+ 0#".contains(*f)) {
                match flag {
                    '-' => flags.left = true,
                    '+' => flags.plus = true,
                    ' ' => flags.space = true,
                    '0' => flags.zero = true,
                    _ => flags.alternate = true,
                }
            }
            let width = take_number(&mut chars);
            let precision = if chars.next_if(|(_, p)| *p == '.').is_some() {
                Some(take_number(&mut chars).unwrap_or(0))
            } else {
                None
            };
            let (_, conversion) = chars.next().ok_or_else(|| invalid(format.len()))?;
            let conversion = match conversion {
                'f' | 'F' => Conversion::Fixed,
                'e' => Conversion::Exponent { upper: false },
                'E' => Conversion::Exponent { upper: true },
                'g' => Conversion::General { upper: false },
                'G' => Conversion::General { upper: true },
                'd' | 'i' | 'u' => Conversion::Integer,
                's' => Conversion::Plain,
                other => {
                    return Err(FormatError::UnsupportedConversion {
                        format: format.to_string(),
                        conversion: other,
                    });
                }
            };
            parsed = Some((flags, width, precision, conversion));
        }

        let (flags, width, precision, conversion) =
            parsed.ok_or_else(|| FormatError::NoConversion(format.to_string()))?;
        Ok(Self {
            prefix,
            suffix,
            flags,
            width,
            precision,
            conversion,
        })
    }

    pub fn format(&self, value: f64) -> String {
        let body = if value.is_finite() {
            self.format_magnitude(value.abs())
        } else if value.is_nan() {
            "nan".to_string()
        } else {
            "inf".to_string()
        };

        let sign = if value.is_sign_negative() && !body.chars().all(|c| c == '0' || c == '.') {
            "-"
        } else if self.flags.plus {
            "+"
        } else if self.flags.space {
            " "
        } else {
            ""
        };

        let len = sign.len() + body.len();
        let padded = match self.width {
            Some(width) if width > len => {
                let fill = width - len;
                if self.flags.left {
                    format!("{}{}{}", sign, body, " ".repeat(fill))
                } else if self.flags.zero && value.is_finite() {
                    format!("{}{}{}", sign, "0".repeat(fill), body)
                } else {
                    format!("{}{}{}", " ".repeat(fill), sign, body)
                }
            }
            _ => format!("{}{}", sign, body),
        };
        format!("{}{}{}", self.prefix, padded, self.suffix)
    }

    fn format_magnitude(&self, magnitude: f64) -> String {
        match self.conversion {
            Conversion::Fixed => format!("{:.*}", self.precision.unwrap_or(6), magnitude),
            Conversion::Exponent { upper } => {
                exponent_form(magnitude, self.precision.unwrap_or(6), upper)
            }
            Conversion::General { upper } => {
                general_form(magnitude, self.precision.unwrap_or(6), upper, self.flags.alternate)
            }
            Conversion::Integer => format!("{}", magnitude.trunc()),
            Conversion::Plain => match self.precision {
                Some(precision) => format!("{:.*}", precision, magnitude),
                None => format!("{}", magnitude),
            },
        }
    }
}

impl Default for NumberFormat {
    /// Equivalent to "%6.2f".
    fn default() -> Self {
        Self {
            prefix: String::new(),
            suffix: String::new(),
            flags: Flags::default(),
            width: Some(6),
            precision: Some(2),
            conversion: Conversion::Fixed,
        }
    }
}

fn take_number<I>(chars: &mut std::iter::Peekable<I>) -> Option<usize>
where
    I: Iterator<Item = (usize, char)>,
{
    let mut digits = String::new();
    while let Some((_, d)) = chars.next_if(|(_, d)| d.is_ascii_digit()) {
        digits.push(d);
    }
    digits.parse().ok()
}

/// C-style exponent: at least two exponent digits with an explicit sign.
fn exponent_form(magnitude: f64, precision: usize, upper: bool) -> String {
    let rust = format!("{:.*e}", precision, magnitude);
    let (mantissa, exponent) = rust.split_once('e').unwrap_or((rust.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let marker = if upper { 'E' } else { 'e' };
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{}{}{}{:02}", mantissa, marker, sign, exponent.abs())
}

fn general_form(magnitude: f64, precision: usize, upper: bool, alternate: bool) -> String {
    let precision = precision.max(1);
    let scientific = format!("{:.*e}", precision - 1, magnitude);
    let exponent: i32 = scientific
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);

    let formatted = if exponent < -4 || exponent >= precision as i32 {
        exponent_form(magnitude, precision - 1, upper)
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        format!("{:.*}", decimals, magnitude)
    };
    if alternate {
        formatted
    } else {
        strip_trailing_zeros(&formatted)
    }
}

fn strip_trailing_zeros(formatted: &str) -> String {
    let (number, exponent) = match formatted.find(['e', 'E']) {
        Some(idx) => formatted.split_at(idx),
        None => (formatted, ""),
    };
    if !number.contains('.') {
        return formatted.to_string();
    }
    let trimmed = number.trim_end_matches('0').trim_end_matches('.');
    format!("{}{}", trimmed, exponent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(format: &str, value: f64) -> String {
        NumberFormat::parse(format).unwrap().format(value)
    }

    #[test]
    fn test_fixed() {
        assert_eq!(fmt("%6.2f", 4.56789), "  4.57");
        assert_eq!(fmt("%.1f", -2.26), "-2.3");
        assert_eq!(fmt("%06.1f", -2.5), "-002.5");
        assert_eq!(fmt("%-6.1fus", 2.5), "2.5   us");
        assert_eq!(fmt("%+.0f", 7.0), "+7");
        assert_eq!(fmt("%f", 1.0), "1.000000");
    }

    #[test]
    fn test_exponent_and_general() {
        assert_eq!(fmt("%.2e", 12345.0), "1.23e+04");
        assert_eq!(fmt("%.1E", 0.00012), "1.2E-04");
        assert_eq!(fmt("%g", 0.0001), "0.0001");
        assert_eq!(fmt("%g", 1234567.0), "1.23457e+06");
        assert_eq!(fmt("%g", 2.5), "2.5");
        assert_eq!(fmt("%.3g", 100.0), "100");
    }

    #[test]
    fn test_integer_and_literals() {
        assert_eq!(fmt("%d", 42.9), "42");
        assert_eq!(fmt("%5d%%", -3.0), "   -3%");
        assert_eq!(fmt("~%s", 1.5), "~1.5");
    }

    #[test]
    fn test_default_matches_chart_default() {
        assert_eq!(
            NumberFormat::default(),
            NumberFormat::parse(crate::domain::chart_config::DEFAULT_FORMAT).unwrap()
        );
    }

    #[test]
    fn test_negative_zero_has_no_sign() {
        assert_eq!(fmt("%.1f", -0.01), "0.0");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            NumberFormat::parse("value"),
            Err(FormatError::NoConversion(_))
        ));
        assert!(matches!(
            NumberFormat::parse("%.2q"),
            Err(FormatError::UnsupportedConversion { conversion: 'q', .. })
        ));
        assert!(matches!(
            NumberFormat::parse("%.2"),
            Err(FormatError::Invalid { .. })
        ));
        assert!(matches!(
            NumberFormat::parse("%f %f"),
            Err(FormatError::Invalid { position: 3, .. })
        ));
    }
}
