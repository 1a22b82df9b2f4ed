//! Canonical linked-entity model
//!
//! Every provider payload is converted into an [`Entity`] before it reaches the
//! gateway, and every context store response is decoded back into one. The
//! wire shape (NGSI-LD normalized JSON-LD) lives in [`jsonld`]; identifiers in
//! [`id`]; `q=` equality filters in [`filter`].

pub mod filter;
pub mod id;
pub mod jsonld;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::types::GatewayError;

pub use filter::{discriminator_from_filter, extract_discriminator_from_filter, EqualityFilter};
pub use id::{extract_discriminator, extract_type, EntityId};

/// NGSI-LD core context
pub const NGSI_LD_CORE_CONTEXT: &str = "https://uri.etsi.org/ngsi-ld/v1/ngsi-ld-core-context.jsonld";

/// Smart Data Models context (AirQualityObserved, WeatherObserved, ...)
pub const SMART_DATA_MODELS_CONTEXT: &str = "https://smartdatamodels.org/context.jsonld";

/// The fixed `@context` emitted on every entity, in order.
pub const ENTITY_CONTEXT: [&str; 2] = [NGSI_LD_CORE_CONTEXT, SMART_DATA_MODELS_CONTEXT];

/// Entity types served by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityType {
    AirQualityObserved,
    Country,
    WeatherObserved,
}

impl EntityType {
    pub const ALL: [EntityType; 3] = [
        EntityType::AirQualityObserved,
        EntityType::Country,
        EntityType::WeatherObserved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AirQualityObserved => "AirQualityObserved",
            Self::Country => "Country",
            Self::WeatherObserved => "WeatherObserved",
        }
    }

    /// Parse a short type name or an expanded type IRI
    /// (`https://smartdatamodels.org/dataModel.Environment/AirQualityObserved`).
    pub fn parse(raw: &str) -> Option<Self> {
        let short = raw.rsplit(|c: char| c == '/' || c == '#').next().unwrap_or(raw);
        Self::ALL.into_iter().find(|t| t.as_str() == short)
    }

    /// Attribute whose equality filter carries this type's discriminator.
    pub fn discriminator_attribute(&self) -> &'static str {
        match self {
            Self::AirQualityObserved | Self::WeatherObserved => "address.addressLocality",
            Self::Country => "countryCode",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| GatewayError::UnknownEntityType(s.to_string()))
    }
}

/// WGS84 point, stored in GeoJSON order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

/// A typed attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Property {
        value: Value,
        unit_code: Option<String>,
        observed_at: Option<String>,
    },
    GeoProperty {
        point: GeoPoint,
    },
    Relationship {
        object: String,
    },
}

impl PropertyValue {
    pub fn property(value: impl Into<Value>) -> Self {
        Self::Property {
            value: value.into(),
            unit_code: None,
            observed_at: None,
        }
    }

    /// Property with a UN/CEFACT unit code
    pub fn measured(value: impl Into<Value>, unit_code: &str) -> Self {
        Self::Property {
            value: value.into(),
            unit_code: Some(unit_code.to_string()),
            observed_at: None,
        }
    }

    pub fn point(lon: f64, lat: f64) -> Self {
        Self::GeoProperty {
            point: GeoPoint { lon, lat },
        }
    }

    pub fn relationship(object: impl Into<String>) -> Self {
        Self::Relationship {
            object: object.into(),
        }
    }

    /// The plain value of a `Property`, `None` for the other kinds.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Property { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// A canonical, identified, typed record
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: String,
    pub entity_type: EntityType,
    pub properties: BTreeMap<String, PropertyValue>,
    pub observed_at: Option<DateTime<Utc>>,
}

impl Entity {
    pub fn new(id: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            id: id.into(),
            entity_type,
            properties: BTreeMap::new(),
            observed_at: None,
        }
    }

    /// Empty entity carrying the wire form of `id`.
    pub fn from_id(id: &EntityId) -> Self {
        Self::new(id.to_urn(), id.entity_type)
    }

    pub fn with_property(mut self, name: &str, value: PropertyValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn with_observed_at(mut self, observed_at: DateTime<Utc>) -> Self {
        self.observed_at = Some(observed_at);
        self
    }

    pub fn insert(&mut self, name: &str, value: PropertyValue) {
        self.properties.insert(name.to_string(), value);
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Resolve a dotted path such as `address.addressLocality`.
    ///
    /// The first segment names the attribute; the rest walk into the
    /// attribute's JSON value. Relationships resolve to their target id.
    pub fn value_at_path(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let attribute = self.properties.get(segments.next()?)?;

        let mut current = match attribute {
            PropertyValue::Property { value, .. } => value,
            PropertyValue::Relationship { object } => {
                return segments
                    .next()
                    .is_none()
                    .then(|| Value::String(object.clone()));
            }
            PropertyValue::GeoProperty { .. } => return None,
        };

        for segment in segments {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        jsonld::encode(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Entity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        jsonld::decode(&value).map_err(serde::de::Error::custom)
    }
}
