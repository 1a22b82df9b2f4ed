//! Entity identifiers
//!
//! Wire form: `urn:ngsi-ld:<Type>:<discriminator>[:<qualifier>]`, with the
//! discriminator and qualifier percent-encoded so that values containing
//! `:` or `==` survive a round trip. Plain alphanumeric ids such as
//! `urn:ngsi-ld:Country:VN` are unchanged by the encoding.

use std::fmt;

use super::EntityType;

const URN_PREFIX: &str = "urn:ngsi-ld";

/// Structured form of an entity id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityId {
    pub entity_type: EntityType,
    /// Locality name or country code
    pub discriminator: String,
    /// Provider-specific suffix, e.g. an OpenAQ location id
    pub qualifier: Option<String>,
}

impl EntityId {
    pub fn new(entity_type: EntityType, discriminator: impl Into<String>) -> Self {
        Self {
            entity_type,
            discriminator: discriminator.into(),
            qualifier: None,
        }
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// `urn:ngsi-ld:AirQualityObserved:<locality>:<locationId>`
    pub fn air_quality(locality: &str, location_id: impl fmt::Display) -> Self {
        Self::new(EntityType::AirQualityObserved, locality).with_qualifier(location_id.to_string())
    }

    /// `urn:ngsi-ld:Country:<code>`
    pub fn country(code: &str) -> Self {
        Self::new(EntityType::Country, code)
    }

    /// `urn:ngsi-ld:WeatherObserved:<city>`
    pub fn weather(city: &str) -> Self {
        Self::new(EntityType::WeatherObserved, city)
    }

    /// Parse a wire id. Returns `None` unless the id starts with `urn:` and
    /// its type segment names a served entity type. A missing discriminator
    /// segment parses as the empty string.
    pub fn parse(raw: &str) -> Option<Self> {
        let segments: Vec<&str> = raw.split(':').collect();
        if segments.len() < 3 || !segments[0].eq_ignore_ascii_case("urn") {
            return None;
        }

        let entity_type = EntityType::parse(segments[2])?;
        let discriminator = segments.get(3).map(|s| decode_segment(s)).unwrap_or_default();
        let qualifier = (segments.len() > 4).then(|| decode_segment(&segments[4..].join(":")));

        Some(Self {
            entity_type,
            discriminator,
            qualifier,
        })
    }

    pub fn to_urn(&self) -> String {
        let mut urn = format!(
            "{}:{}:{}",
            URN_PREFIX,
            self.entity_type.as_str(),
            urlencoding::encode(&self.discriminator)
        );
        if let Some(qualifier) = &self.qualifier {
            urn.push(':');
            urn.push_str(&urlencoding::encode(qualifier));
        }
        urn
    }

    /// Same entity, comparing the discriminator case-insensitively the way
    /// the upstream providers do.
    pub fn refers_to(&self, other: &EntityId) -> bool {
        self.entity_type == other.entity_type
            && self.discriminator.to_lowercase() == other.discriminator.to_lowercase()
            && self.qualifier == other.qualifier
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_urn())
    }
}

fn decode_segment(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

/// Entity type named by an id, `None` when the id is malformed.
pub fn extract_type(id: &str) -> Option<EntityType> {
    EntityId::parse(id).map(|parsed| parsed.entity_type)
}

/// Locality or country code named by an id, empty when the id is malformed.
pub fn extract_discriminator(id: &str) -> String {
    EntityId::parse(id)
        .map(|parsed| parsed.discriminator)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_ids_match_legacy_form() {
        assert_eq!(EntityId::country("VN").to_urn(), "urn:ngsi-ld:Country:VN");
        assert_eq!(
            EntityId::air_quality("Hanoi", 8118).to_urn(),
            "urn:ngsi-ld:AirQualityObserved:Hanoi:8118"
        );
        assert_eq!(EntityId::weather("Hanoi").to_string(), "urn:ngsi-ld:WeatherObserved:Hanoi");
    }

    #[test]
    fn test_extract_inverts_construction() {
        let cases = [
            EntityId::country("VN"),
            EntityId::weather("Ho Chi Minh City"),
            EntityId::weather("a:b==c"),
            EntityId::air_quality("Thành phố Hồ Chí Minh", 2161292),
        ];

        for id in cases {
            let urn = id.to_urn();
            assert_eq!(extract_type(&urn), Some(id.entity_type), "{}", urn);
            assert_eq!(extract_discriminator(&urn), id.discriminator, "{}", urn);
            assert_eq!(EntityId::parse(&urn), Some(id));
        }
    }

    #[test]
    fn test_decoded_id_has_same_canonical_form() {
        let stored = EntityId::weather("Ho Chi Minh City").to_urn();
        let decoded = EntityId::parse("urn:ngsi-ld:WeatherObserved:Ho Chi Minh City").unwrap();
        assert_eq!(decoded.to_urn(), stored);
    }

    #[test]
    fn test_refers_to_ignores_discriminator_case() {
        assert!(EntityId::weather("Hanoi").refers_to(&EntityId::weather("hanoi")));
        assert!(!EntityId::weather("Hanoi").refers_to(&EntityId::weather("Hue")));
        assert!(!EntityId::air_quality("Hanoi", 1).refers_to(&EntityId::air_quality("Hanoi", 2)));
        assert!(!EntityId::country("VN").refers_to(&EntityId::weather("VN")));
    }

    #[test]
    fn test_legacy_qualifier_with_colons() {
        let parsed = EntityId::parse("urn:ngsi-ld:AirQualityObserved:Hanoi:a:b").unwrap();
        assert_eq!(parsed.discriminator, "Hanoi");
        assert_eq!(parsed.qualifier.as_deref(), Some("a:b"));
    }

    #[test]
    fn test_malformed_ids_degrade() {
        assert_eq!(extract_type("not-an-id"), None);
        assert_eq!(extract_type("urn:ngsi-ld:Foo:bar"), None);
        assert_eq!(extract_discriminator("urn:ngsi-ld:Foo:bar"), "");
        assert_eq!(extract_discriminator(""), "");

        // type known, discriminator missing
        assert_eq!(extract_type("urn:ngsi-ld:Country"), Some(EntityType::Country));
        assert_eq!(extract_discriminator("urn:ngsi-ld:Country"), "");
    }
}
