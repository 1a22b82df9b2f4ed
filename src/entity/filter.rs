//! `q=` equality filters (`attribute==value`)

use serde_json::Value;

use super::{Entity, EntityType};

/// A single equality predicate over a dotted attribute path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqualityFilter {
    pub attribute: String,
    pub value: String,
    /// Whether the value was written as a quoted string
    pub quoted: bool,
}

impl EqualityFilter {
    /// Parse `attr==value` or `attr=="value"`.
    ///
    /// Splits on the first `==` only, so values may themselves contain `==`.
    /// An attribute side containing `;` or `|` is a compound expression and
    /// is rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let (attribute, value) = raw.trim().split_once("==")?;
        let attribute = attribute.trim();
        if attribute.is_empty() || attribute.contains(|c: char| c == ';' || c == '|') {
            return None;
        }

        let value = value.trim();
        let unquoted = value.strip_prefix('"').and_then(|v| v.strip_suffix('"'));
        Some(Self {
            attribute: attribute.to_string(),
            value: unquoted.unwrap_or(value).to_string(),
            quoted: unquoted.is_some(),
        })
    }

    /// Unquoted number or boolean, compared by value rather than as text
    fn literal(&self) -> Option<Value> {
        if self.quoted {
            return None;
        }
        match self.value.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            raw => serde_json::from_str::<serde_json::Number>(raw).ok().map(Value::Number),
        }
    }

    /// Whether the entity's value at `attribute` equals the filter value.
    ///
    /// Literals only match numbers and booleans, everything else only
    /// matches strings, the same way the broker evaluates `q`.
    pub fn matches(&self, entity: &Entity) -> bool {
        let actual = entity.value_at_path(&self.attribute);
        match (self.literal(), actual) {
            (Some(Value::Bool(expected)), Some(Value::Bool(b))) => expected == b,
            (Some(Value::Number(expected)), Some(Value::Number(n))) => expected.as_f64() == n.as_f64(),
            (None, Some(Value::String(s))) => s == self.value,
            _ => false,
        }
    }

    /// Wire form: literals bare, strings quoted with `"` escaped.
    pub fn to_query(&self) -> String {
        match self.literal() {
            Some(_) => format!("{}=={}", self.attribute, self.value),
            None => format!("{}==\"{}\"", self.attribute, self.value.replace('"', "\\\"")),
        }
    }
}

/// Value of an equality filter, or `""` when there is none.
pub fn extract_discriminator_from_filter(filter: Option<&str>) -> String {
    filter
        .and_then(EqualityFilter::parse)
        .map(|f| f.value)
        .unwrap_or_default()
}

/// Like [`extract_discriminator_from_filter`], but only when the filter is
/// over the attribute that routes `entity_type` to its upstream.
pub fn discriminator_from_filter(entity_type: EntityType, filter: Option<&str>) -> String {
    filter
        .and_then(EqualityFilter::parse)
        .filter(|f| f.attribute == entity_type.discriminator_attribute())
        .map(|f| f.value)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::PropertyValue;
    use serde_json::json;

    #[test]
    fn test_parse() {
        let f = EqualityFilter::parse("address.addressLocality==Hanoi").unwrap();
        assert_eq!(f.attribute, "address.addressLocality");
        assert_eq!(f.value, "Hanoi");

        let f = EqualityFilter::parse("countryCode==\"VN\"").unwrap();
        assert_eq!(f.value, "VN");

        let f = EqualityFilter::parse("name==a==b").unwrap();
        assert_eq!(f.value, "a==b");

        assert_eq!(EqualityFilter::parse("name"), None);
        assert_eq!(EqualityFilter::parse("==x"), None);
        assert_eq!(EqualityFilter::parse("a;b==1"), None);
    }

    #[test]
    fn test_discriminator_from_filter() {
        assert_eq!(
            discriminator_from_filter(EntityType::WeatherObserved, Some("address.addressLocality==Hanoi")),
            "Hanoi"
        );
        assert_eq!(
            discriminator_from_filter(EntityType::Country, Some("countryCode==TH")),
            "TH"
        );
        // filter on some other attribute does not route
        assert_eq!(discriminator_from_filter(EntityType::Country, Some("name==Thailand")), "");
        assert_eq!(discriminator_from_filter(EntityType::Country, None), "");
        assert_eq!(extract_discriminator_from_filter(Some("name==Thailand")), "Thailand");
        assert_eq!(extract_discriminator_from_filter(Some("garbage")), "");
    }

    #[test]
    fn test_matches() {
        let entity = Entity::new("urn:ngsi-ld:AirQualityObserved:Hanoi:1", EntityType::AirQualityObserved)
            .with_property("address", PropertyValue::property(json!({"addressLocality": "Hanoi"})))
            .with_property("isMobile", PropertyValue::property(false));

        assert!(EqualityFilter::parse("address.addressLocality==Hanoi").unwrap().matches(&entity));
        assert!(EqualityFilter::parse("isMobile==false").unwrap().matches(&entity));
        assert!(!EqualityFilter::parse("address.addressLocality==Hue").unwrap().matches(&entity));
        assert!(!EqualityFilter::parse("missing==x").unwrap().matches(&entity));
        // a quoted "false" is a string and does not match the boolean
        assert!(!EqualityFilter::parse("isMobile==\"false\"").unwrap().matches(&entity));
    }

    #[test]
    fn test_numeric_match() {
        let entity = Entity::new("urn:ngsi-ld:Country:VN", EntityType::Country)
            .with_property("countryId", PropertyValue::property(56))
            .with_property("code", PropertyValue::property("56"));

        assert!(EqualityFilter::parse("countryId==56").unwrap().matches(&entity));
        assert!(EqualityFilter::parse("countryId==56.0").unwrap().matches(&entity));
        assert!(!EqualityFilter::parse("code==56").unwrap().matches(&entity));
        assert!(EqualityFilter::parse("code==\"56\"").unwrap().matches(&entity));
    }

    #[test]
    fn test_to_query() {
        let query = |raw: &str| EqualityFilter::parse(raw).unwrap().to_query();

        assert_eq!(query("isMobile==false"), "isMobile==false");
        assert_eq!(query("countryId==56"), "countryId==56");
        assert_eq!(query("countryCode==TH"), "countryCode==\"TH\"");
        assert_eq!(query("code==\"56\""), "code==\"56\"");
        assert_eq!(query("name==say \"hi\""), "name==\"say \\\"hi\\\"\"");
    }
}
