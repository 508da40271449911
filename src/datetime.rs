//! UTC datetimes with millisecond precision.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::error::{Error, Result};

const MILLIS_PER_SEC: i64 = 1_000;
const NANOS_PER_MILLI: i128 = 1_000_000;

// 10000-01-01T00:00:00Z. Instants at or past this point (and anything
// before the epoch) cannot use the ISO-8601 text form.
const ISO_RANGE_END_MS: i64 = 253_402_300_800_000;

/// A BSON UTC datetime: a signed count of milliseconds since the Unix
/// epoch, in either direction.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTime(i64);

impl DateTime {
    /// The earliest representable instant.
    pub const MIN: DateTime = DateTime(i64::MIN);
    /// The latest representable instant.
    pub const MAX: DateTime = DateTime(i64::MAX);

    pub const fn from_millis(ms: i64) -> DateTime {
        DateTime(ms)
    }

    /// Milliseconds since the Unix epoch.
    pub const fn timestamp_millis(&self) -> i64 {
        self.0
    }

    /// The current instant, truncated to milliseconds.
    pub fn now() -> DateTime {
        Self::from_system_time(SystemTime::now())
    }

    /// Convert from a [`SystemTime`]. Instants outside the i64
    /// millisecond range clamp to [`DateTime::MIN`] / [`DateTime::MAX`].
    pub fn from_system_time(st: SystemTime) -> DateTime {
        let millis: i128 = match st.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_millis() as i128,
            Err(e) => -(e.duration().as_millis() as i128),
        };
        DateTime(millis.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }

    /// Convert to a [`SystemTime`]. The rare instant the platform clock
    /// type cannot hold collapses to the epoch rather than panicking.
    pub fn to_system_time(&self) -> SystemTime {
        let offset = if self.0 >= 0 {
            UNIX_EPOCH.checked_add(Duration::from_millis(self.0 as u64))
        } else {
            UNIX_EPOCH.checked_sub(Duration::from_millis(self.0.unsigned_abs()))
        };
        offset.unwrap_or(UNIX_EPOCH)
    }

    /// Whether this instant lies in `[1970-01-01, 10000-01-01)`, the
    /// window the relaxed Extended JSON text form covers.
    pub(crate) fn is_iso_printable(&self) -> bool {
        (0..ISO_RANGE_END_MS).contains(&self.0)
    }

    /// Format as ISO-8601 in UTC. Milliseconds are printed only when the
    /// sub-second part is non-zero. Fails outside the printable window.
    pub fn to_iso_string(&self) -> Result<String> {
        if !self.is_iso_printable() {
            return Err(Error::InvalidArgument(format!(
                "datetime {}ms is outside the ISO-8601 range",
                self.0
            )));
        }
        let odt = OffsetDateTime::from_unix_timestamp_nanos(self.0 as i128 * NANOS_PER_MILLI)
            .map_err(|e| Error::InvalidArgument(format!("datetime {}ms: {}", self.0, e)))?;
        let format = if self.0 % MILLIS_PER_SEC == 0 {
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z")
        } else {
            format_description!(
                "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
            )
        };
        odt.format(format)
            .map_err(|e| Error::InvalidArgument(format!("datetime {}ms: {}", self.0, e)))
    }

    /// Parse an ISO-8601 datetime with or without a fractional-second
    /// part, with `Z` or a numeric offset. Sub-millisecond digits are
    /// truncated.
    pub fn parse_iso_str(s: &str) -> Result<DateTime> {
        let odt = OffsetDateTime::parse(s, &Rfc3339).map_err(|_| {
            Error::InvalidArgument(format!("\"{}\" is not an ISO-8601 datetime", s))
        })?;
        Ok(DateTime(
            odt.unix_timestamp_nanos().div_euclid(NANOS_PER_MILLI) as i64,
        ))
    }
}

impl fmt::Debug for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.to_iso_string() {
            Ok(s) => write!(f, "DateTime(\"{}\")", s),
            Err(_) => write!(f, "DateTime({}ms)", self.0),
        }
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.to_iso_string() {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{}ms since epoch", self.0),
        }
    }
}

impl From<SystemTime> for DateTime {
    fn from(st: SystemTime) -> Self {
        Self::from_system_time(st)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn iso_without_millis() {
        let dt = DateTime::from_millis(978_312_200_000);
        assert_eq!(dt.to_iso_string().unwrap(), "2001-01-01T01:23:20Z");
    }

    #[test]
    fn iso_with_millis() {
        let dt = DateTime::from_millis(978_312_200_123);
        assert_eq!(dt.to_iso_string().unwrap(), "2001-01-01T01:23:20.123Z");
    }

    #[test]
    fn parse_both_formats() {
        let plain = DateTime::parse_iso_str("2001-01-01T01:23:20Z").unwrap();
        assert_eq!(plain.timestamp_millis(), 978_312_200_000);
        let frac = DateTime::parse_iso_str("2001-01-01T01:23:20.500Z").unwrap();
        assert_eq!(frac.timestamp_millis(), 978_312_200_500);
    }

    #[test]
    fn parse_numeric_offset() {
        let dt = DateTime::parse_iso_str("2001-01-01T02:23:20+01:00").unwrap();
        assert_eq!(dt.timestamp_millis(), 978_312_200_000);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(DateTime::parse_iso_str("yesterday").is_err());
        assert!(DateTime::parse_iso_str("2001-01-01").is_err());
    }

    #[test]
    fn iso_window() {
        assert!(DateTime::from_millis(0).is_iso_printable());
        assert!(DateTime::from_millis(ISO_RANGE_END_MS - 1).is_iso_printable());
        assert!(!DateTime::from_millis(ISO_RANGE_END_MS).is_iso_printable());
        assert!(!DateTime::from_millis(-1).is_iso_printable());
        assert!(DateTime::from_millis(-1).to_iso_string().is_err());
    }

    #[test]
    fn epoch_formats_as_1970() {
        assert_eq!(
            DateTime::from_millis(0).to_iso_string().unwrap(),
            "1970-01-01T00:00:00Z"
        );
    }

    #[test]
    fn system_time_round_trip() {
        let st = UNIX_EPOCH + Duration::from_millis(1_234_567);
        let dt = DateTime::from_system_time(st);
        assert_eq!(dt.timestamp_millis(), 1_234_567);
        assert_eq!(dt.to_system_time(), st);
    }
}
