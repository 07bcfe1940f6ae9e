use chrono::{DateTime, Utc};
use thiserror::Error;

/// TeamCity's native timestamp format, e.g. `20190816T091958+0000`.
pub const TEAMCITY_FORMAT: &str = "%Y%m%dT%H%M%S%z";

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("failed to parse timestamp '{value}' with format '{format}': {source}")]
    Parse {
        value: String,
        format: &'static str,
        #[source]
        source: chrono::ParseError,
    },
}

/// Parses an optional TeamCity timestamp field, normalized to UTC.
///
/// An absent or empty field is the unset sentinel (`None`). A populated field
/// that does not match the fixed pattern is a hard error: it means the server
/// emitted data inconsistent with our assumptions, not that the phase has not
/// been reached yet.
pub fn parse_optional(value: Option<&str>) -> Result<Option<DateTime<Utc>>, TimestampError> {
    match value {
        None => Ok(None),
        Some(raw) if raw.is_empty() => Ok(None),
        Some(raw) => {
            let parsed = DateTime::parse_from_str(raw, TEAMCITY_FORMAT).map_err(|source| {
                TimestampError::Parse {
                    value: raw.to_string(),
                    format: TEAMCITY_FORMAT,
                    source,
                }
            })?;
            Ok(Some(parsed.with_timezone(&Utc)))
        }
    }
}
