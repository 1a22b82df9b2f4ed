//! Cache key definitions

use std::fmt;

use crate::entity::EntityType;

/// Key for one upstream fetch: an entity type and the locality or country
/// code it was fetched for. The discriminator is lowercased, since the
/// providers match localities and country codes case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub entity_type: EntityType,
    pub discriminator: String,
}

impl FetchKey {
    pub fn new(entity_type: EntityType, discriminator: &str) -> Self {
        Self {
            entity_type,
            discriminator: discriminator.trim().to_lowercase(),
        }
    }
}

impl fmt::Display for FetchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.discriminator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_key() {
        let key = FetchKey::new(EntityType::Country, "VN");
        assert_eq!(key.to_string(), "Country:vn");
        assert_eq!(key, FetchKey::new(EntityType::Country, "VN"));
        assert_ne!(key, FetchKey::new(EntityType::Country, "TH"));
        assert_ne!(
            FetchKey::new(EntityType::WeatherObserved, "Hanoi"),
            FetchKey::new(EntityType::AirQualityObserved, "Hanoi")
        );
    }

    #[test]
    fn test_fetch_key_ignores_case() {
        assert_eq!(
            FetchKey::new(EntityType::WeatherObserved, "Hanoi"),
            FetchKey::new(EntityType::WeatherObserved, "hanoi ")
        );
        assert_eq!(FetchKey::new(EntityType::Country, "vn"), FetchKey::new(EntityType::Country, "VN"));
    }
}
