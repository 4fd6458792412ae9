use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

// ---------------------------------------------------------------------------
// FieldValue – a single cell of a loaded record
// ---------------------------------------------------------------------------

/// A dynamically-typed record field, mirroring the JSON scalar types.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{s}"),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Null => write!(f, "<null>"),
        }
    }
}

impl FieldValue {
    /// Numeric view of the value, if it has a finite one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) if v.is_finite() => Some(*v),
            FieldValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Text used as a bucket key. `Null` has no key.
    pub fn as_key_text(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// A record as handed over by the loading collaborator: field name → value.
pub type RawRecord = BTreeMap<String, FieldValue>;

// ---------------------------------------------------------------------------
// Record – one immutable entry of the dataset
// ---------------------------------------------------------------------------

/// A loaded record with its timestamp already parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Canonical timestamp (UTC).
    pub t: DateTime<Utc>,
    /// All fields of the source record, including the raw timestamp field.
    pub fields: RawRecord,
}

impl Record {
    pub fn new(t: DateTime<Utc>, fields: RawRecord) -> Self {
        Self { t, fields }
    }

    /// Numeric value of `field`; missing or non-numeric fields count as 0.
    pub fn number(&self, field: &str) -> f64 {
        self.fields
            .get(field)
            .and_then(FieldValue::as_f64)
            .unwrap_or(0.0)
    }

    /// Key text of `field`, `None` when absent or null.
    pub fn text(&self, field: &str) -> Option<String> {
        self.fields.get(field).and_then(FieldValue::as_key_text)
    }
}

// ---------------------------------------------------------------------------
// Bucket keys
// ---------------------------------------------------------------------------

/// Key of a dimension bucket. A dimension only ever produces one variant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Time(DateTime<Utc>),
    Ordinal(u32),
    Text(String),
}

impl Key {
    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Key::Time(t) => Some(*t),
            _ => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Time(t) => write!(f, "{}", t.format("%Y-%m-%d")),
            Key::Ordinal(n) => write!(f, "{n}"),
            Key::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<DateTime<Utc>> for Key {
    fn from(t: DateTime<Utc>) -> Self {
        Key::Time(t)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Text(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Timestamp coercion
// ---------------------------------------------------------------------------

/// Coerce a field into a UTC timestamp.
///
/// Accepted forms:
/// * integer or float – milliseconds since the Unix epoch
/// * RFC 3339 string – `2024-03-01T10:00:00Z`, `2024-03-01T10:00:00+02:00`
/// * naive date-time – `2024-03-01 10:00:00` or `2024-03-01T10:00:00(.fff)`
/// * date – `2024-03-01` (midnight)
pub fn coerce_timestamp(value: &FieldValue) -> Result<DateTime<Utc>, String> {
    match value {
        FieldValue::Integer(ms) => from_millis(*ms),
        FieldValue::Float(ms) if ms.is_finite() => from_millis(ms.round() as i64),
        FieldValue::String(s) => parse_time_str(s.trim()),
        other => Err(format!("'{other}' is not a timestamp")),
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, String> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| format!("{ms} ms is out of range"))
}

fn parse_time_str(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::default())));
    }
    Err(format!("'{s}' is not a timestamp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn coerces_epoch_millis() {
        let t = coerce_timestamp(&FieldValue::Integer(86_400_000)).unwrap();
        assert_eq!(t.to_rfc3339(), "1970-01-02T00:00:00+00:00");

        let t = coerce_timestamp(&FieldValue::Float(1_000.4)).unwrap();
        assert_eq!(t.timestamp_millis(), 1_000);
    }

    #[test]
    fn coerces_strings() {
        let t = coerce_timestamp(&FieldValue::String("2024-03-01T10:30:00+02:00".into())).unwrap();
        assert_eq!(t.hour(), 8);

        let t = coerce_timestamp(&FieldValue::String("2024-03-01 23:15:00".into())).unwrap();
        assert_eq!(t.hour(), 23);

        let t = coerce_timestamp(&FieldValue::String("2024-03-01".into())).unwrap();
        assert_eq!(t.hour(), 0);
    }

    #[test]
    fn rejects_non_timestamps() {
        assert!(coerce_timestamp(&FieldValue::String("yesterday".into())).is_err());
        assert!(coerce_timestamp(&FieldValue::Bool(true)).is_err());
        assert!(coerce_timestamp(&FieldValue::Null).is_err());
        assert!(coerce_timestamp(&FieldValue::Float(f64::NAN)).is_err());
    }

    #[test]
    fn missing_number_counts_as_zero() {
        let mut fields = RawRecord::new();
        fields.insert("value".into(), FieldValue::Integer(3));
        fields.insert("label".into(), FieldValue::String("x".into()));
        let r = Record::new(Utc::now(), fields);

        assert_eq!(r.number("value"), 3.0);
        assert_eq!(r.number("label"), 0.0);
        assert_eq!(r.number("absent"), 0.0);
        assert_eq!(r.text("label").as_deref(), Some("x"));
        assert_eq!(r.text("absent"), None);
    }

    #[test]
    fn non_finite_numbers_count_as_zero() {
        let mut fields = RawRecord::new();
        fields.insert("inf".into(), FieldValue::Float(f64::INFINITY));
        fields.insert("nan".into(), FieldValue::Float(f64::NAN));
        let r = Record::new(Utc::now(), fields);

        assert_eq!(FieldValue::Float(f64::NEG_INFINITY).as_f64(), None);
        assert_eq!(r.number("inf"), 0.0);
        assert_eq!(r.number("nan"), 0.0);
    }
}
