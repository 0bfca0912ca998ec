use std::time::Duration;

use crate::ConfigLoadError;

/// Parse a humantime duration (`"90s"`, `"5m"`, `"1h 30m"`), naming the
/// offending setting on failure.
pub fn parse_duration(
    field: &'static str,
    raw: &str,
) -> Result<Duration, ConfigLoadError> {
    humantime::parse_duration(raw.trim()).map_err(|source| {
        ConfigLoadError::InvalidDuration {
            field,
            value: raw.to_string(),
            source,
        }
    })
}

/// Pick the first present value, environment before file.
pub fn first_of<T: Clone>(env: &Option<T>, file: &Option<T>) -> Option<T> {
    env.clone().or_else(|| file.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_compound_durations() {
        let parsed = parse_duration("refresh.timeout", "1m 30s").unwrap();
        assert_eq!(parsed, Duration::from_secs(90));
    }

    #[test]
    fn rejects_garbage_with_field_name() {
        let err = parse_duration("refresh.timeout", "soon").unwrap_err();
        assert!(err.to_string().contains("refresh.timeout"));
    }
}
