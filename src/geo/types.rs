use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::LookupError;

/// Fields turned into classification tags, in priority order
pub const CLASS_FIELDS: [&str; 9] = [
    "version",
    "city",
    "region",
    "region_code",
    "country",
    "country_code",
    "country_code_iso3",
    "asn",
    "org",
];

/// Geolocation record as returned by the provider and stored in the cache.
///
/// The fields the formatter relies on are typed; everything else the
/// provider sends (coordinates, timezone, currency, ...) is kept verbatim in
/// `extra` so newer provider fields survive a cache round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoInfo {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub region_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub country_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub country_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub country_code_iso3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub asn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub org: Option<String>,

    /// Regional indicator pair derived from `country_code`
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub flag: Option<String>,
    /// When the record was fetched from the provider
    #[serde(default, skip_serializing_if = "Option::is_none", with = "timestamp")]
    pub last_update: Option<NaiveDateTime>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GeoInfo {
    /// Known string fields by name, in declaration order
    pub fn known_fields(&self) -> [(&'static str, Option<&str>); 13] {
        [
            ("ip", self.ip.as_deref()),
            ("network", self.network.as_deref()),
            ("version", self.version.as_deref()),
            ("city", self.city.as_deref()),
            ("region", self.region.as_deref()),
            ("region_code", self.region_code.as_deref()),
            ("country", self.country.as_deref()),
            ("country_name", self.country_name.as_deref()),
            ("country_code", self.country_code.as_deref()),
            ("country_code_iso3", self.country_code_iso3.as_deref()),
            ("asn", self.asn.as_deref()),
            ("org", self.org.as_deref()),
            ("flag", self.flag.as_deref()),
        ]
    }

    /// Look up a known string field by name
    pub fn field(&self, name: &str) -> Option<&str> {
        self.known_fields()
            .into_iter()
            .find(|(key, _)| *key == name)
            .and_then(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.known_fields().iter().all(|(_, value)| value.is_none())
            && self.last_update.is_none()
            && self.extra.is_empty()
    }
}

/// Failure record carried in place of a `GeoInfo`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub error: bool,
    pub reason: String,
}

impl ErrorInfo {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            error: true,
            reason: reason.into(),
        }
    }
}

impl From<LookupError> for ErrorInfo {
    fn from(err: LookupError) -> Self {
        Self::new(err.to_string())
    }
}

/// Result of one geolocation lookup
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Found(GeoInfo),
    Failed(ErrorInfo),
    /// Well-formed but empty answer
    Empty,
}

impl From<LookupError> for LookupOutcome {
    fn from(err: LookupError) -> Self {
        LookupOutcome::Failed(err.into())
    }
}

/// Either the literal `"error"` class or a list of classification tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ClassField {
    Single(String),
    Tags(Vec<String>),
}

impl ClassField {
    pub fn error() -> Self {
        ClassField::Single("error".to_string())
    }
}

/// One line of status bar output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresentationRecord {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    pub tooltip: String,
    pub class: ClassField,
}

/// Accept strings, and stringify numbers or booleans
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a string, found {}",
            other
        ))),
    }
}

pub mod timestamp {
    //! `last_update` text representation

    use chrono::{DateTime, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

    pub fn to_text(ts: &NaiveDateTime) -> String {
        ts.format(FORMAT).to_string()
    }

    /// Parse either our own format or RFC 3339
    pub fn parse(raw: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_local()))
    }

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&to_text(ts)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {:?}", raw))),
        }
    }
}
