use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// chrono format string for `YYYY-MM-DD HH:MM:SS`.
pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Human-readable form of [`FORMAT`], used in error messages.
pub const PATTERN: &str = "YYYY-MM-DD HH:MM:SS";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed timestamp {0:?}, expected {pattern}", pattern = PATTERN)]
pub struct TimestampError(pub String);

/// A UTC instant at whole-second resolution, written on the wire as
/// `YYYY-MM-DD HH:MM:SS` with no offset suffix.
///
/// Converting from a `DateTime<Utc>` truncates any sub-second part, so
/// `decode(encode(t)) == t` only for instants that were already whole
/// seconds. The conversion is lossy by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Truncates `instant` to whole seconds.
    pub fn from_instant(instant: DateTime<Utc>) -> Self {
        let secs = instant.timestamp();
        // Re-building from the second count drops the nanosecond field.
        Self(DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or(instant))
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn encode(&self) -> String {
        self.0.format(FORMAT).to_string()
    }

    /// Parse `raw` as `YYYY-MM-DD HH:MM:SS`, interpreted as UTC.
    ///
    /// Rejects anything that is not exactly 19 characters with `-`, ` `
    /// and `:` in the fixed positions. chrono on its own would also take
    /// unpadded fields such as `2024-1-1`.
    pub fn decode(raw: &str) -> Result<Self, TimestampError> {
        if !has_fixed_layout(raw) {
            return Err(TimestampError(raw.to_owned()));
        }
        NaiveDateTime::parse_from_str(raw, FORMAT)
            .map(|naive| Self(naive.and_utc()))
            .map_err(|_| TimestampError(raw.to_owned()))
    }
}

fn has_fixed_layout(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() == PATTERN.len()
        && bytes.iter().zip(PATTERN.bytes()).all(|(&b, p)| match p {
            b'Y' | b'M' | b'D' | b'H' | b'S' => b.is_ascii_digit(),
            sep => b == sep,
        })
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(instant: DateTime<Utc>) -> Self {
        Self::from_instant(instant)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TimestampVisitor;

        impl de::Visitor<'_> for TimestampVisitor {
            type Value = Timestamp;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a timestamp string formatted as {PATTERN}")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Timestamp, E> {
                Timestamp::decode(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(TimestampVisitor)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Timelike};

    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn encode_is_zero_padded_24_hour() {
        let ts = Timestamp::from_instant(utc(2024, 1, 2, 3, 4, 5));
        assert_eq!(ts.encode(), "2024-01-02 03:04:05");

        let ts = Timestamp::from_instant(utc(2023, 12, 31, 23, 59, 59));
        assert_eq!(ts.encode(), "2023-12-31 23:59:59");
    }

    #[test]
    fn decode_reads_as_utc() {
        let ts = Timestamp::decode("2024-01-01 00:10:00").unwrap();
        assert_eq!(ts.instant(), utc(2024, 1, 1, 0, 10, 0));
    }

    #[test]
    fn decode_rejects_offsets_and_extra_characters() {
        for raw in [
            "2024-01-01T00:00:00",
            "2024-01-01 00:00:00Z",
            "2024-01-01 00:00:00+02:00",
            "2024-01-01 00:00:00.5",
            " 2024-01-01 00:00:00",
            "2024/01/01 00:00:00",
            "2024-1-1 0:0:0",
            "2024-01-01",
            "",
        ] {
            let err = Timestamp::decode(raw).unwrap_err();
            assert_eq!(err, TimestampError(raw.to_owned()), "input {raw:?}");
        }
    }

    #[test]
    fn error_names_the_input_and_the_pattern() {
        let err = Timestamp::decode("2024-01-01T00:00:00Z").unwrap_err();
        assert_eq!(
            err.to_string(),
            "malformed timestamp \"2024-01-01T00:00:00Z\", expected YYYY-MM-DD HH:MM:SS"
        );
    }

    #[test]
    fn decode_rejects_out_of_range_fields() {
        assert!(Timestamp::decode("2024-13-01 00:00:00").is_err());
        assert!(Timestamp::decode("2024-02-30 00:00:00").is_err());
        assert!(Timestamp::decode("2024-01-01 24:00:00").is_err());
    }

    #[test]
    fn round_trip_truncates_sub_seconds() {
        let precise = utc(2024, 5, 6, 7, 8, 9).with_nanosecond(987_654_321).unwrap();
        let ts = Timestamp::from_instant(precise);
        let decoded = Timestamp::decode(&ts.encode()).unwrap();

        assert_eq!(decoded, ts);
        assert_eq!(decoded.instant(), utc(2024, 5, 6, 7, 8, 9));
    }

    #[test]
    fn serde_uses_the_fixed_pattern() {
        let ts = Timestamp::decode("2024-01-01 00:00:00").unwrap();
        assert_eq!(serde_json::to_string(&ts).unwrap(), "\"2024-01-01 00:00:00\"");

        let back: Timestamp = serde_json::from_str("\"2024-01-01 00:00:00\"").unwrap();
        assert_eq!(back, ts);

        let err = serde_json::from_str::<Timestamp>("\"2024-01-01T00:00:00Z\"").unwrap_err();
        assert!(err.to_string().starts_with("malformed timestamp"));
    }

    #[test]
    fn ordering_follows_the_instant() {
        let a = Timestamp::decode("2024-01-01 00:00:00").unwrap();
        let b = Timestamp::decode("2024-01-01 00:00:01").unwrap();
        assert!(a < b);
    }
}
