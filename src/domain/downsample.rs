// Downsample bucket selection from a time range
use super::error::ConfigurationError;

/// Range breakpoints in milliseconds, ascending. Ranges under an hour are not downsampled.
pub const DOWNSAMPLE_TABLE: [(i64, &str); 15] = [
    (3_600_000, "10s-avg"),       // 1 hour
    (7_200_000, "30s-avg"),       // 2 hours
    (14_400_000, "45s-avg"),      // 4 hours
    (18_000_000, "1m-avg"),       // 5 hours
    (28_800_000, "2m-avg"),       // 8 hours
    (43_200_000, "3m-avg"),       // 12 hours
    (64_800_000, "4m-avg"),       // 18 hours
    (86_400_000, "5m-avg"),       // 1 day
    (172_800_000, "10m-avg"),     // 2 days
    (259_200_000, "15m-avg"),     // 3 days
    (604_800_000, "1h-avg"),      // 1 week
    (1_209_600_000, "2h-avg"),    // 2 weeks
    (2_419_200_000, "6h-avg"),    // 4 weeks
    (9_676_800_000, "1d-avg"),    // 16 weeks
    (31_536_000_000, "10d-avg"),  // 1 year
];

/// Multiplier applied by [`step_seconds`] when spacing projection samples.
pub const DEFAULT_PROJECTION_DENSITY: i64 = 10;

/// Last table entry whose threshold is at or below `delta_ms`.
pub fn select(delta_ms: i64) -> Option<&'static str> {
    DOWNSAMPLE_TABLE
        .iter()
        .take_while(|(threshold, _)| *threshold <= delta_ms)
        .last()
        .map(|(_, token)| *token)
}

/// Sampling step in seconds for a token like "10s-avg", scaled by `density`.
pub fn step_seconds(token: &str, density: i64) -> Result<i64, ConfigurationError> {
    let invalid = || ConfigurationError::InvalidDownsample(token.to_string());

    let bucket = token.split('-').next().ok_or_else(invalid)?;
    let digits_end = bucket
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let amount: i64 = bucket[..digits_end].parse().map_err(|_| invalid())?;
    let unit_secs = match &bucket[digits_end..] {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        _ => return Err(invalid()),
    };
    amount
        .checked_mul(unit_secs)
        .and_then(|secs| secs.checked_mul(density.max(1)))
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_boundaries() {
        assert_eq!(select(0), None);
        assert_eq!(select(3_599_999), None);
        assert_eq!(select(3_600_000), Some("10s-avg"));
        assert_eq!(select(7_200_000), Some("30s-avg"));
        assert_eq!(select(7_199_999), Some("10s-avg"));
        assert_eq!(select(31_536_000_000), Some("10d-avg"));
        assert_eq!(select(i64::MAX), Some("10d-avg"));
        assert_eq!(select(-5), None);
    }

    #[test]
    fn test_select_is_monotonic() {
        let position = |token: Option<&str>| {
            token.map_or(-1, |t| {
                DOWNSAMPLE_TABLE.iter().position(|(_, x)| *x == t).unwrap() as i64
            })
        };
        let mut previous = -1;
        for delta in (0..40_000_000_000_i64).step_by(97_000_000) {
            let current = position(select(delta));
            assert!(current >= previous, "delta {}", delta);
            previous = current;
        }
    }

    #[test]
    fn test_step_seconds() {
        assert_eq!(step_seconds("10s-avg", 1).unwrap(), 10);
        assert_eq!(step_seconds("1m-avg", 10).unwrap(), 600);
        assert_eq!(step_seconds("2h-max", 1).unwrap(), 7_200);
        assert_eq!(step_seconds("10d-avg", 2).unwrap(), 1_728_000);
        assert!(step_seconds("avg", 1).is_err());
        assert!(step_seconds("10", 1).is_err());
        assert!(step_seconds("5w-avg", 1).is_err());
    }

    #[test]
    fn test_step_seconds_overflow() {
        assert_eq!(
            step_seconds("9999999999999999d-avg", 10),
            Err(ConfigurationError::InvalidDownsample("9999999999999999d-avg".to_string()))
        );
        assert!(step_seconds("9223372036854775807s-avg", 2).is_err());
        assert_eq!(step_seconds("9223372036854775807s-avg", 1).unwrap(), i64::MAX);
    }
}
