//! Typed attribute values.
//!
//! Attribute values are a closed set of six variants. Raw input strings are
//! parsed against the declared [`AttributeDataType`]; anything that does not
//! fit is rejected rather than stored as text.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::error::{InvalidValue, ProvenanceError};

/// Declared type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub enum AttributeDataType {
    Integer,
    Float,
    String,
    IntegerArray,
    FloatArray,
    StringArray,
}

impl AttributeDataType {
    /// Canonical name as written on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "Integer",
            Self::Float => "Float",
            Self::String => "String",
            Self::IntegerArray => "IntegerArray",
            Self::FloatArray => "FloatArray",
            Self::StringArray => "StringArray",
        }
    }

    /// Parse a raw input value into this type.
    ///
    /// Scalars are parsed from their textual form, arrays from a JSON array.
    pub fn parse_value(&self, attribute: &str, raw: &str) -> Result<AttributeValue, InvalidValue> {
        let invalid = |reason: String| InvalidValue {
            attribute: attribute.to_string(),
            data_type: *self,
            value: raw.to_string(),
            reason,
        };

        match self {
            Self::Integer => raw
                .trim()
                .parse::<i64>()
                .map(AttributeValue::Integer)
                .map_err(|e| invalid(e.to_string())),
            Self::Float => {
                let value = raw.trim().parse::<f64>().map_err(|e| invalid(e.to_string()))?;
                if !value.is_finite() {
                    return Err(invalid("value is not a finite number".to_string()));
                }
                Ok(AttributeValue::Float(value))
            }
            Self::String => Ok(AttributeValue::String(raw.to_string())),
            Self::IntegerArray => serde_json::from_str::<Vec<i64>>(raw)
                .map(AttributeValue::IntegerArray)
                .map_err(|e| invalid(e.to_string())),
            Self::FloatArray => serde_json::from_str::<Vec<f64>>(raw)
                .map(AttributeValue::FloatArray)
                .map_err(|e| invalid(e.to_string())),
            Self::StringArray => serde_json::from_str::<Vec<String>>(raw)
                .map(AttributeValue::StringArray)
                .map_err(|e| invalid(e.to_string())),
        }
    }
}

impl fmt::Display for AttributeDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttributeDataType {
    type Err = ProvenanceError;

    /// Accepts the canonical names plus the aliases older clients send
    /// (`int`, `long`, `double`, `ArrayOfString`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let data_type = match s {
            "Integer" | "int" | "Long" | "long" => Self::Integer,
            "Float" | "float" | "Double" | "double" => Self::Float,
            "String" | "string" => Self::String,
            "Array" | "StringArray" | "ArrayOfString" => Self::StringArray,
            "intArray" | "IntegerArray" | "ArrayOfInt" | "ArrayOfInteger" | "longArray"
            | "LongArray" | "ArrayOfLong" => Self::IntegerArray,
            "floatArray" | "FloatArray" | "ArrayOfFloat" | "doubleArray" | "DoubleArray"
            | "ArrayOfDouble" => Self::FloatArray,
            other => {
                return Err(ProvenanceError::Invalid(format!(
                    "The data type {} is not supported",
                    other
                )))
            }
        };
        Ok(data_type)
    }
}

/// A parsed attribute value.
///
/// Serialized untagged so the JSON type follows the variant. An empty array
/// decodes as `IntegerArray`; callers that need the declared type look it up
/// in the schema registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(untagged)]
pub enum AttributeValue {
    Integer(i64),
    Float(f64),
    String(String),
    IntegerArray(Vec<i64>),
    FloatArray(Vec<f64>),
    StringArray(Vec<String>),
}

impl AttributeValue {
    pub fn data_type(&self) -> AttributeDataType {
        match self {
            Self::Integer(_) => AttributeDataType::Integer,
            Self::Float(_) => AttributeDataType::Float,
            Self::String(_) => AttributeDataType::String,
            Self::IntegerArray(_) => AttributeDataType::IntegerArray,
            Self::FloatArray(_) => AttributeDataType::FloatArray,
            Self::StringArray(_) => AttributeDataType::StringArray,
        }
    }

    /// Order of this value relative to an integer literal, used by `lt`/`gt`
    /// conditions.
    ///
    /// Integers compare exactly. Floats, and strings whose trimmed text parses
    /// as a number, compare numerically. Anything else has no order.
    pub fn cmp_integer(&self, limit: i64) -> Option<Ordering> {
        match self {
            Self::Integer(v) => Some(v.cmp(&limit)),
            Self::Float(v) => v.partial_cmp(&(limit as f64)),
            Self::String(s) => {
                let text = s.trim();
                match text.parse::<i64>() {
                    Ok(v) => Some(v.cmp(&limit)),
                    Err(_) => text
                        .parse::<f64>()
                        .ok()
                        .filter(|v| v.is_finite())
                        .and_then(|v| v.partial_cmp(&(limit as f64))),
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(s) => f.write_str(s),
            Self::IntegerArray(v) => write!(f, "{}", serde_json::json!(v)),
            Self::FloatArray(v) => write!(f, "{}", serde_json::json!(v)),
            Self::StringArray(v) => write!(f, "{}", serde_json::json!(v)),
        }
    }
}

/// One attribute value on a record, pinned to the attribute version it was
/// written under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Attribute {
    pub name: String,
    #[serde(rename = "attributeVersion")]
    pub version: u32,
    pub value: AttributeValue,
}

impl Attribute {
    pub fn new(name: impl Into<String>, version: u32, value: AttributeValue) -> Self {
        Self {
            name: name.into(),
            version,
            value,
        }
    }
}

/// Insert or replace by case-insensitive name. Lists never hold two entries
/// with the same name.
pub(crate) fn upsert_attribute(attributes: &mut Vec<Attribute>, attribute: Attribute) {
    match attributes
        .iter_mut()
        .find(|a| a.name.eq_ignore_ascii_case(&attribute.name))
    {
        Some(existing) => *existing = attribute,
        None => attributes.push(attribute),
    }
}

pub(crate) fn remove_attribute(attributes: &mut Vec<Attribute>, name: &str) -> bool {
    let before = attributes.len();
    attributes.retain(|a| !a.name.eq_ignore_ascii_case(name));
    attributes.len() != before
}

pub(crate) fn find_attribute<'a>(attributes: &'a [Attribute], name: &str) -> Option<&'a Attribute> {
    attributes.iter().find(|a| a.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("long".parse::<AttributeDataType>().unwrap(), AttributeDataType::Integer);
        assert_eq!("Double".parse::<AttributeDataType>().unwrap(), AttributeDataType::Float);
        assert_eq!("Array".parse::<AttributeDataType>().unwrap(), AttributeDataType::StringArray);
        assert_eq!(
            "ArrayOfDouble".parse::<AttributeDataType>().unwrap(),
            AttributeDataType::FloatArray
        );
        assert!("Decimal".parse::<AttributeDataType>().is_err());
    }

    #[test]
    fn test_parse_values_by_type() {
        let int = AttributeDataType::Integer.parse_value("Count", " 42 ").unwrap();
        assert_eq!(int, AttributeValue::Integer(42));

        let floats = AttributeDataType::FloatArray
            .parse_value("Temps", "[1.5, 2, -3.25]")
            .unwrap();
        assert_eq!(floats, AttributeValue::FloatArray(vec![1.5, 2.0, -3.25]));

        let words = AttributeDataType::StringArray
            .parse_value("Tags", r#"["bio", "raw"]"#)
            .unwrap();
        assert_eq!(words.to_string(), r#"["bio","raw"]"#);
    }

    #[test]
    fn test_parse_rejects_mismatched_values() {
        let err = AttributeDataType::Integer.parse_value("Count", "4.2").unwrap_err();
        assert_eq!(err.attribute, "Count");
        assert_eq!(err.data_type, AttributeDataType::Integer);

        assert!(AttributeDataType::Float.parse_value("Temp", "NaN").is_err());
        assert!(AttributeDataType::IntegerArray.parse_value("Ids", "[1, \"2\"]").is_err());
        assert!(AttributeDataType::StringArray.parse_value("Tags", "bio").is_err());
    }

    #[test]
    fn test_value_json_shape_follows_variant() {
        let attribute = Attribute::new("Temp", 2, AttributeValue::Float(3.0));
        let json = serde_json::to_value(&attribute).unwrap();
        assert_eq!(json["attributeVersion"], 2);

        let decoded: Attribute = serde_json::from_value(json).unwrap();
        assert_eq!(decoded.value, AttributeValue::Float(3.0));

        let decoded: AttributeValue = serde_json::from_str("7").unwrap();
        assert_eq!(decoded, AttributeValue::Integer(7));
    }

    #[test]
    fn test_upsert_replaces_case_insensitively() {
        let mut list = vec![Attribute::new("Quality", 1, AttributeValue::String("A".into()))];
        upsert_attribute(
            &mut list,
            Attribute::new("quality", 2, AttributeValue::String("B".into())),
        );

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].version, 2);
        assert!(remove_attribute(&mut list, "QUALITY"));
        assert!(list.is_empty());
    }

    #[test]
    fn test_integer_ordering() {
        assert_eq!(AttributeValue::String(" 10 ".into()).cmp_integer(5), Some(Ordering::Greater));
        assert_eq!(AttributeValue::Float(4.5).cmp_integer(5), Some(Ordering::Less));
        assert_eq!(AttributeValue::String("Bio".into()).cmp_integer(5), None);
        assert_eq!(AttributeValue::IntegerArray(vec![1]).cmp_integer(5), None);

        // 2^53 + 1 is not representable as f64
        let large = AttributeValue::Integer(9_007_199_254_740_993);
        assert_eq!(large.cmp_integer(9_007_199_254_740_992), Some(Ordering::Greater));
        assert_eq!(
            AttributeValue::String("9007199254740993".into()).cmp_integer(9_007_199_254_740_992),
            Some(Ordering::Greater)
        );
    }
}
