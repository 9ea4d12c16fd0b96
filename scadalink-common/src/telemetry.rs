use chrono::{DateTime, Local, SubsecRound};
use serde::{Deserialize, Serialize};

/// Wire format for reading timestamps (local time, second resolution).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Acquisition quality of a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Good,
    Bad,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Good => "good",
            Quality::Bad => "bad",
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One tag's value for one poll cycle.
///
/// A good reading always carries a value and no error; a bad reading
/// carries an error detail and no value. Use [`Reading::good`] and
/// [`Reading::bad`] to keep that invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Name copied from the tag.
    pub tag_name: String,

    /// Decoded value, widened to `f64`. Serialised as `null` when bad.
    pub value: Option<f64>,

    /// Acquisition quality.
    pub quality: Quality,

    /// Acquisition instant.
    #[serde(with = "timestamp_format")]
    pub timestamp: DateTime<Local>,

    /// Diagnostic detail for bad readings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Reading {
    /// A good-quality reading.
    pub fn good(tag_name: impl Into<String>, value: f64, timestamp: DateTime<Local>) -> Self {
        Self {
            tag_name: tag_name.into(),
            value: Some(value),
            quality: Quality::Good,
            timestamp: timestamp.trunc_subsecs(0),
            error: None,
        }
    }

    /// A bad-quality reading with the cause preserved verbatim.
    pub fn bad(
        tag_name: impl Into<String>,
        error: impl Into<String>,
        timestamp: DateTime<Local>,
    ) -> Self {
        Self {
            tag_name: tag_name.into(),
            value: None,
            quality: Quality::Bad,
            timestamp: timestamp.trunc_subsecs(0),
            error: Some(error.into()),
        }
    }

    pub fn is_good(&self) -> bool {
        self.quality == Quality::Good
    }
}

/// Current local time truncated to whole seconds.
pub fn now() -> DateTime<Local> {
    Local::now().trunc_subsecs(0)
}

mod timestamp_format {
    use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S>(timestamp: &DateTime<Local>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&timestamp.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Local>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let naive = NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(D::Error::custom)?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| D::Error::custom(format!("nonexistent local time '{}'", raw)))
    }
}
