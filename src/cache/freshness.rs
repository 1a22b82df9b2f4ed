//! Freshness policy for cached entities

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

use crate::entity::jsonld::timestamp_in;
use crate::entity::Entity;

/// Default maximum observation age (30 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Property carrying the observation time
pub const OBSERVED_PROPERTY: &str = "dateObserved";

/// Decides whether cached entities can be served without refetching.
///
/// An entity is fresh iff `now - observed < ttl`. Entities without a
/// parseable observation time are always stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    ttl: Duration,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self { ttl: DEFAULT_TTL }
    }
}

impl FreshnessPolicy {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Observation time: `dateObserved` first, then top-level `observedAt`.
    pub fn observed_at(entity: &Entity) -> Option<DateTime<Utc>> {
        entity
            .property(OBSERVED_PROPERTY)
            .and_then(|p| p.value())
            .and_then(timestamp_in)
            .or(entity.observed_at)
    }

    pub fn is_fresh(&self, entity: &Entity) -> bool {
        self.is_fresh_at(entity, Utc::now())
    }

    pub fn is_fresh_at(&self, entity: &Entity, now: DateTime<Utc>) -> bool {
        let Some(observed) = Self::observed_at(entity) else {
            return false;
        };
        // A TTL too large for chrono never expires
        let Ok(ttl) = TimeDelta::from_std(self.ttl) else {
            return true;
        };
        now.signed_duration_since(observed) < ttl
    }

    /// A set is fresh when it is non-empty and its first entity is fresh.
    /// Batch fetches share one vintage, so the first record stands for all.
    pub fn is_fresh_set(&self, entities: &[Entity]) -> bool {
        self.is_fresh_set_at(entities, Utc::now())
    }

    pub fn is_fresh_set_at(&self, entities: &[Entity], now: DateTime<Utc>) -> bool {
        entities
            .first()
            .map(|first| self.is_fresh_at(first, now))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityType, PropertyValue};
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn observed(minutes_ago: i64) -> Entity {
        let at = now() - TimeDelta::minutes(minutes_ago);
        Entity::new("urn:ngsi-ld:WeatherObserved:Hanoi", EntityType::WeatherObserved).with_property(
            OBSERVED_PROPERTY,
            PropertyValue::property(at.to_rfc3339()),
        )
    }

    #[test]
    fn test_ttl_boundary() {
        let policy = FreshnessPolicy::default();
        assert!(policy.is_fresh_at(&observed(10), now()));
        assert!(policy.is_fresh_at(&observed(29), now()));
        assert!(!policy.is_fresh_at(&observed(30), now()));
        assert!(!policy.is_fresh_at(&observed(45), now()));
    }

    #[test]
    fn test_falls_back_to_observed_at() {
        let policy = FreshnessPolicy::default();
        let entity = Entity::new("urn:ngsi-ld:Country:VN", EntityType::Country)
            .with_property(OBSERVED_PROPERTY, PropertyValue::property("not a date"))
            .with_observed_at(now() - TimeDelta::minutes(5));
        assert!(policy.is_fresh_at(&entity, now()));

        let typed = Entity::new("urn:ngsi-ld:Country:VN", EntityType::Country).with_property(
            OBSERVED_PROPERTY,
            PropertyValue::property(json!({"@type": "DateTime", "@value": "2025-03-01T11:50:00Z"})),
        );
        assert!(policy.is_fresh_at(&typed, now()));
    }

    #[test]
    fn test_no_timestamp_is_stale() {
        let policy = FreshnessPolicy::default();
        let entity = Entity::new("urn:ngsi-ld:Country:VN", EntityType::Country);
        assert!(!policy.is_fresh_at(&entity, now()));
    }

    #[test]
    fn test_set_uses_first_entity() {
        let policy = FreshnessPolicy::new(Duration::from_secs(600));
        assert!(!policy.is_fresh_set_at(&[], now()));
        assert!(policy.is_fresh_set_at(&[observed(5), observed(60)], now()));
        assert!(!policy.is_fresh_set_at(&[observed(60), observed(5)], now()));
    }
}
