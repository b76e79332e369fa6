//! Acceptance rules.
//!
//! Each organisation keeps one rule set: per asset type, a map of attribute
//! name to condition. An incoming asset is accepted only when every condition
//! for its type holds against its merged public and private attributes.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProvenanceError;
use crate::types::{find_attribute, Attribute, AttributeValue};

/// A single condition: a two-letter operator followed by a literal.
///
/// `eqBio` holds when the value renders exactly as `Bio`; `lt5` and `gt5`
/// compare the numeric value strictly against the integer literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Condition {
    Eq(String),
    Lt(i64),
    Gt(i64),
}

impl Condition {
    pub fn check(&self, value: &AttributeValue) -> bool {
        match self {
            Self::Eq(expected) => value.to_string() == *expected,
            Self::Lt(limit) => value.cmp_integer(*limit) == Some(Ordering::Less),
            Self::Gt(limit) => value.cmp_integer(*limit) == Some(Ordering::Greater),
        }
    }
}

impl FromStr for Condition {
    type Err = ProvenanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            ProvenanceError::Invalid(format!(
                "The condition {} is invalid (expected eq<text>, lt<integer> or gt<integer>)",
                s
            ))
        };
        let (op, literal) = match (s.get(..2), s.get(2..)) {
            (Some(op), Some(literal)) => (op, literal),
            _ => return Err(invalid()),
        };
        match op {
            "eq" => Ok(Self::Eq(literal.to_string())),
            "lt" => literal.parse().map(Self::Lt).map_err(|_| invalid()),
            "gt" => literal.parse().map(Self::Gt).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Condition {
    type Error = ProvenanceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Condition> for String {
    fn from(condition: Condition) -> Self {
        condition.to_string()
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq(literal) => write!(f, "eq{}", literal),
            Self::Lt(limit) => write!(f, "lt{}", limit),
            Self::Gt(limit) => write!(f, "gt{}", limit),
        }
    }
}

/// One organisation's acceptance rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceRuleSet {
    #[serde(default)]
    pub owner: String,
    #[serde(rename = "productToAttributeAndRule", default)]
    pub rules: BTreeMap<String, BTreeMap<String, Condition>>,
    #[serde(rename = "autoAccept", default)]
    pub auto_accept: bool,
}

impl AcceptanceRuleSet {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            ..Default::default()
        }
    }

    fn asset_type_key(&self, asset_type: &str) -> Option<&String> {
        self.rules.keys().find(|k| k.eq_ignore_ascii_case(asset_type))
    }

    /// Add or overwrite one condition.
    pub fn add_condition(&mut self, asset_type: &str, attribute: &str, condition: Condition) {
        let type_key = self
            .asset_type_key(asset_type)
            .cloned()
            .unwrap_or_else(|| asset_type.to_string());
        let conditions = self.rules.entry(type_key).or_default();
        let attribute_key = conditions
            .keys()
            .find(|k| k.eq_ignore_ascii_case(attribute))
            .cloned()
            .unwrap_or_else(|| attribute.to_string());
        conditions.insert(attribute_key, condition);
    }

    pub fn conditions_for(&self, asset_type: &str) -> Option<&BTreeMap<String, Condition>> {
        self.asset_type_key(asset_type).and_then(|k| self.rules.get(k))
    }

    /// Returns whether anything was removed.
    pub fn delete_asset_type_rules(&mut self, asset_type: &str) -> bool {
        match self.asset_type_key(asset_type).cloned() {
            Some(key) => self.rules.remove(&key).is_some(),
            None => false,
        }
    }

    /// Check every condition registered for `asset_type` against `attributes`.
    ///
    /// Stops at the first failure. An attribute named by a rule but absent
    /// from `attributes` fails.
    pub fn evaluate(
        &self,
        asset_type: &str,
        attributes: &[Attribute],
    ) -> Result<(), ProvenanceError> {
        let Some(conditions) = self.conditions_for(asset_type) else {
            return Ok(());
        };

        for (name, condition) in conditions {
            let attribute = find_attribute(attributes, name).ok_or_else(|| {
                ProvenanceError::RuleAttributeMissing {
                    attribute: name.clone(),
                    condition: condition.to_string(),
                }
            })?;
            if !condition.check(&attribute.value) {
                return Err(ProvenanceError::RuleViolation {
                    attribute: name.clone(),
                    value: attribute.value.to_string(),
                    condition: condition.to_string(),
                });
            }
            tracing::debug!(
                attribute = %name,
                condition = %condition,
                "acceptance condition holds"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn string(name: &str, value: &str) -> Attribute {
        Attribute::new(name, 1, AttributeValue::String(value.into()))
    }

    fn milk_rules() -> AcceptanceRuleSet {
        let mut rules = AcceptanceRuleSet::new("Org2MSP");
        rules.add_condition("milklot", "Quality", "eqBio".parse().unwrap());
        rules.add_condition("milklot", "AmountInLiter", "gt5".parse().unwrap());
        rules
    }

    #[test]
    fn test_parse_conditions() {
        assert_eq!("eqBio".parse::<Condition>().unwrap(), Condition::Eq("Bio".into()));
        assert_eq!("lt-3".parse::<Condition>().unwrap(), Condition::Lt(-3));
        assert_eq!("gt10".parse::<Condition>().unwrap().to_string(), "gt10");
        for bad in ["", "e", "neBio", "gt", "lt4.5", "gtten"] {
            assert!(bad.parse::<Condition>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_evaluate_passes_and_fails() {
        let rules = milk_rules();
        let good = vec![string("Quality", "Bio"), string("AmountInLiter", "10")];
        rules.evaluate("milklot", &good).unwrap();

        let bad = vec![string("Quality", "Bio"), string("AmountInLiter", "3")];
        match rules.evaluate("MilkLot", &bad).unwrap_err() {
            ProvenanceError::RuleViolation {
                attribute,
                value,
                condition,
            } => {
                assert_eq!(attribute, "AmountInLiter");
                assert_eq!(value, "3");
                assert_eq!(condition, "gt5");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_attribute_fails() {
        let rules = milk_rules();
        let err = rules
            .evaluate("milklot", &[string("Quality", "Bio")])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RuleViolation);
        assert!(matches!(err, ProvenanceError::RuleAttributeMissing { .. }));
    }

    #[test]
    fn test_numeric_conditions_use_typed_values() {
        let mut rules = AcceptanceRuleSet::new("Org2MSP");
        rules.add_condition("cheese", "Weight", Condition::Lt(100));
        let light = vec![Attribute::new("Weight", 1, AttributeValue::Float(99.5))];
        let heavy = vec![Attribute::new("Weight", 1, AttributeValue::Integer(100))];
        let tags = vec![Attribute::new("Weight", 1, AttributeValue::StringArray(vec![]))];

        assert!(rules.evaluate("cheese", &light).is_ok());
        assert!(rules.evaluate("cheese", &heavy).is_err());
        assert!(rules.evaluate("cheese", &tags).is_err());
        assert!(rules.evaluate("ham", &heavy).is_ok());
    }

    #[test]
    fn test_large_integers_compare_exactly() {
        let mut rules = AcceptanceRuleSet::new("Org2MSP");
        rules.add_condition("milklot", "Count", "gt9007199254740992".parse().unwrap());
        let count = |v| vec![Attribute::new("Count", 1, AttributeValue::Integer(v))];
        let above = count(9_007_199_254_740_993);
        let equal = count(9_007_199_254_740_992);

        assert!(rules.evaluate("milklot", &above).is_ok());
        assert!(rules.evaluate("milklot", &equal).is_err());
    }

    #[test]
    fn test_overwrite_and_delete() {
        let mut rules = milk_rules();
        rules.add_condition("MILKLOT", "quality", "eqRaw".parse().unwrap());
        let conditions = rules.conditions_for("milklot").unwrap();
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions["Quality"], Condition::Eq("Raw".into()));

        assert!(rules.delete_asset_type_rules("milkLot"));
        assert!(!rules.delete_asset_type_rules("milklot"));
        assert!(rules.conditions_for("milklot").is_none());
    }

    #[test]
    fn test_wire_shape() {
        let mut rules = milk_rules();
        rules.auto_accept = true;
        let json = serde_json::to_value(&rules).unwrap();
        assert_eq!(json["productToAttributeAndRule"]["milklot"]["Quality"], "eqBio");
        assert_eq!(json["autoAccept"], true);

        let decoded: AcceptanceRuleSet = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, rules);
    }
}
