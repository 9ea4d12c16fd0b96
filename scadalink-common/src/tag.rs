//! Tag descriptors as served by the central tag registry.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// A named, typed reference to one physical point on a controller.
///
/// Tags are fetched once per run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    /// Semantic name, unique within the registry.
    #[serde(rename = "tag_name")]
    pub name: String,

    /// Protocol-space address (e.g. 40001 for the first holding register).
    /// `None` when the registry row has no address yet; such a tag reads as
    /// bad without failing the rest of the registry.
    #[serde(
        rename = "modbus_address",
        default,
        deserialize_with = "deserialize_address"
    )]
    pub address: Option<u32>,

    /// Point class. A null or missing code is kept as an empty
    /// [`TagClass::Unknown`].
    #[serde(rename = "tag_type", default = "missing_class", deserialize_with = "deserialize_class")]
    pub class: TagClass,

    /// Value encoding; only meaningful for analog classes.
    #[serde(
        rename = "data_type",
        default,
        deserialize_with = "deserialize_encoding"
    )]
    pub encoding: Encoding,

    /// Registry identifier, if the authority supplies one.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_id"
    )]
    pub tag_id: Option<u64>,

    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Engineering unit (e.g. "degC", "bar").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engineering_unit: Option<String>,
}

impl Tag {
    /// Create a tag with no registry metadata.
    pub fn new(name: impl Into<String>, address: u32, class: TagClass, encoding: Encoding) -> Self {
        Self {
            name: name.into(),
            address: Some(address),
            class,
            encoding,
            tag_id: None,
            description: None,
            engineering_unit: None,
        }
    }
}

/// Tag class as reported by the registry (`AI`, `AO`, `DI`, `DO`).
///
/// Unrecognised codes are preserved verbatim so the decoder can decide
/// how to treat them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TagClass {
    AnalogInput,
    AnalogOutput,
    DigitalInput,
    DigitalOutput,
    Unknown(String),
}

impl TagClass {
    /// Registry code for this class.
    pub fn as_str(&self) -> &str {
        match self {
            TagClass::AnalogInput => "AI",
            TagClass::AnalogOutput => "AO",
            TagClass::DigitalInput => "DI",
            TagClass::DigitalOutput => "DO",
            TagClass::Unknown(code) => code,
        }
    }

    /// Whether the class is read from holding registers.
    pub fn is_analog(&self) -> bool {
        matches!(self, TagClass::AnalogInput | TagClass::AnalogOutput)
    }
}

impl From<String> for TagClass {
    fn from(code: String) -> Self {
        match code.as_str() {
            "AI" => TagClass::AnalogInput,
            "AO" => TagClass::AnalogOutput,
            "DI" => TagClass::DigitalInput,
            "DO" => TagClass::DigitalOutput,
            _ => TagClass::Unknown(code),
        }
    }
}

impl From<TagClass> for String {
    fn from(class: TagClass) -> Self {
        class.as_str().to_string()
    }
}

impl std::fmt::Display for TagClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Data encoding of an analog value held in two consecutive registers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Encoding {
    /// IEEE-754 single precision across both registers.
    Float32,
    /// Unsigned 16-bit integer in the first register.
    #[default]
    Uint16,
    /// Signed 16-bit integer in the first register.
    Int16,
    /// Unsigned 32-bit integer across both registers.
    Uint32,
    /// Unrecognised encoding; decoded as `Uint16`.
    Other(String),
}

impl Encoding {
    pub fn as_str(&self) -> &str {
        match self {
            Encoding::Float32 => "float32",
            Encoding::Uint16 => "uint16",
            Encoding::Int16 => "int16",
            Encoding::Uint32 => "uint32",
            Encoding::Other(name) => name,
        }
    }
}

impl From<String> for Encoding {
    fn from(name: String) -> Self {
        match name.as_str() {
            "float32" => Encoding::Float32,
            "uint16" => Encoding::Uint16,
            "int16" => Encoding::Int16,
            "uint32" => Encoding::Uint32,
            _ => Encoding::Other(name),
        }
    }
}

impl From<Encoding> for String {
    fn from(encoding: Encoding) -> Self {
        encoding.as_str().to_string()
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Registry columns may arrive as JSON numbers or numeric strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Text(String),
}

impl NumberOrString {
    fn into_u64(self) -> std::result::Result<u64, String> {
        match self {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::Text(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|e| format!("'{}' is not an integer: {}", s, e)),
        }
    }
}

fn deserialize_address<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<NumberOrString>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let raw = raw.into_u64().map_err(D::Error::custom)?;
    u32::try_from(raw)
        .map(Some)
        .map_err(|_| D::Error::custom(format!("address {} out of range", raw)))
}

fn missing_class() -> TagClass {
    TagClass::Unknown(String::new())
}

fn deserialize_class<'de, D>(deserializer: D) -> std::result::Result<TagClass, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .map(TagClass::from)
        .unwrap_or_else(missing_class))
}

fn deserialize_encoding<'de, D>(deserializer: D) -> std::result::Result<Encoding, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .map(Encoding::from)
        .unwrap_or_default())
}

fn deserialize_optional_id<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<NumberOrString>::deserialize(deserializer)?
        .map(NumberOrString::into_u64)
        .transpose()
        .map_err(D::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_registry_entry() {
        let json = r#"{
            "tag_id": "17",
            "tag_name": "TT-101",
            "tag_type": "AI",
            "description": "Inlet temperature",
            "modbus_address": "40001",
            "data_type": "float32",
            "engineering_unit": "degC",
            "poll_interval_ms": "1000"
        }"#;

        let tag: Tag = serde_json::from_str(json).unwrap();
        assert_eq!(tag.name, "TT-101");
        assert_eq!(tag.address, Some(40001));
        assert_eq!(tag.class, TagClass::AnalogInput);
        assert_eq!(tag.encoding, Encoding::Float32);
        assert_eq!(tag.tag_id, Some(17));
        assert_eq!(tag.engineering_unit.as_deref(), Some("degC"));
    }

    #[test]
    fn test_numeric_address_and_null_id() {
        let json = r#"{"tag_id": null, "tag_name": "XV-7", "tag_type": "DO", "modbus_address": 12, "data_type": null}"#;
        let tag: Tag = serde_json::from_str(json).unwrap();
        assert_eq!(tag.address, Some(12));
        assert_eq!(tag.tag_id, None);
        assert_eq!(tag.encoding, Encoding::Uint16);

        let json = r#"{"tag_name": "XV-8", "tag_type": "DO", "modbus_address": 13}"#;
        let tag: Tag = serde_json::from_str(json).unwrap();
        assert_eq!(tag.encoding, Encoding::Uint16);
    }

    #[test]
    fn test_null_address_and_class_keep_registry() {
        let json = r#"[
            {"tag_name": "TT-1", "tag_type": "AI", "modbus_address": "40001", "data_type": "float32"},
            {"tag_name": "NEW-2", "tag_type": "AI", "modbus_address": null, "data_type": "float32"},
            {"tag_name": "NEW-3", "tag_type": null, "modbus_address": 10001},
            {"tag_name": "NEW-4"}
        ]"#;

        let tags: Vec<Tag> = serde_json::from_str(json).unwrap();
        assert_eq!(tags.len(), 4);
        assert_eq!(tags[0].address, Some(40001));
        assert_eq!(tags[1].address, None);
        assert_eq!(tags[1].class, TagClass::AnalogInput);
        assert_eq!(tags[2].class, TagClass::Unknown(String::new()));
        assert_eq!(tags[3].address, None);
        assert_eq!(tags[3].class, TagClass::Unknown(String::new()));
    }

    #[test]
    fn test_invalid_address_rejected() {
        let json = r#"{"tag_name": "bad", "tag_type": "AI", "modbus_address": "4000x"}"#;
        assert!(serde_json::from_str::<Tag>(json).is_err());
    }

    #[test]
    fn test_unknown_codes_preserved() {
        assert_eq!(
            TagClass::from("PID".to_string()),
            TagClass::Unknown("PID".to_string())
        );
        assert_eq!(TagClass::Unknown("PID".to_string()).as_str(), "PID");
        assert_eq!(
            Encoding::from("float64".to_string()),
            Encoding::Other("float64".to_string())
        );
    }

    #[test]
    fn test_class_round_trip_codes() {
        for code in ["AI", "AO", "DI", "DO"] {
            assert_eq!(String::from(TagClass::from(code.to_string())), code);
        }
        assert!(TagClass::AnalogOutput.is_analog());
        assert!(!TagClass::DigitalInput.is_analog());
    }
}
