//! NGSI-LD normalized JSON-LD codec
//!
//! ```text
//! {
//!   "@context": [core, smart-data-models],
//!   "id": "urn:ngsi-ld:WeatherObserved:Hanoi",
//!   "type": "WeatherObserved",
//!   "observedAt": "2025-01-01T00:00:00Z",
//!   "temperature": { "type": "Property", "value": 31.2, "unitCode": "CEL" },
//!   "location":    { "type": "GeoProperty", "value": { "type": "Point", "coordinates": [lon, lat] } },
//!   "refCountry":  { "type": "Relationship", "object": "urn:ngsi-ld:Country:VN" }
//! }
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use super::{Entity, EntityType, GeoPoint, PropertyValue, ENTITY_CONTEXT};
use crate::types::{GatewayError, Result};

/// Top-level keys that are not attributes
const RESERVED_KEYS: [&str; 4] = ["@context", "id", "type", "observedAt"];

/// Encode a full entity, including `@context`.
pub fn encode(entity: &Entity) -> Value {
    let mut object = Map::new();
    object.insert("@context".to_string(), json!(ENTITY_CONTEXT));
    object.insert("id".to_string(), Value::String(entity.id.clone()));
    object.insert(
        "type".to_string(),
        Value::String(entity.entity_type.as_str().to_string()),
    );
    if let Some(observed_at) = entity.observed_at {
        object.insert("observedAt".to_string(), Value::String(format_timestamp(observed_at)));
    }
    for (name, value) in &entity.properties {
        object.insert(name.clone(), encode_property(value));
    }
    Value::Object(object)
}

/// Encode only the attributes, as expected by `PATCH /entities/{id}/attrs`.
pub fn encode_attributes(entity: &Entity) -> Value {
    let object: Map<String, Value> = entity
        .properties
        .iter()
        .map(|(name, value)| (name.clone(), encode_property(value)))
        .collect();
    Value::Object(object)
}

pub fn encode_property(value: &PropertyValue) -> Value {
    match value {
        PropertyValue::Property {
            value,
            unit_code,
            observed_at,
        } => {
            let mut object = Map::new();
            object.insert("type".to_string(), json!("Property"));
            object.insert("value".to_string(), value.clone());
            if let Some(unit) = unit_code {
                object.insert("unitCode".to_string(), json!(unit));
            }
            if let Some(at) = observed_at {
                object.insert("observedAt".to_string(), json!(at));
            }
            Value::Object(object)
        }
        PropertyValue::GeoProperty { point } => json!({
            "type": "GeoProperty",
            "value": {
                "type": "Point",
                "coordinates": [point.lon, point.lat],
            }
        }),
        PropertyValue::Relationship { object } => json!({
            "type": "Relationship",
            "object": object,
        }),
    }
}

/// Decode an entity from the context store or a client.
pub fn decode(value: &Value) -> Result<Entity> {
    let object = value
        .as_object()
        .ok_or_else(|| GatewayError::Internal("entity must be a JSON object".to_string()))?;

    let id = object
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::Internal("entity is missing a string 'id'".to_string()))?;

    let raw_type = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::Internal(format!("entity '{}' is missing 'type'", id)))?;
    let entity_type = EntityType::parse(raw_type)
        .ok_or_else(|| GatewayError::UnknownEntityType(raw_type.to_string()))?;

    let observed_at = object.get("observedAt").and_then(timestamp_in);

    let mut entity = Entity::new(id, entity_type);
    entity.observed_at = observed_at;

    for (name, raw) in object {
        if RESERVED_KEYS.contains(&name.as_str()) {
            continue;
        }
        entity.insert(name, decode_property(raw));
    }

    Ok(entity)
}

/// Decode one attribute. Anything that is not NGSI-LD shaped (key-values
/// output, non-point geometries) is kept verbatim as a plain `Property`.
pub fn decode_property(raw: &Value) -> PropertyValue {
    let kind = raw.get("type").and_then(Value::as_str);

    match kind {
        Some("Property") => PropertyValue::Property {
            value: raw.get("value").cloned().unwrap_or(Value::Null),
            unit_code: raw.get("unitCode").and_then(Value::as_str).map(str::to_string),
            observed_at: raw.get("observedAt").and_then(Value::as_str).map(str::to_string),
        },
        Some("GeoProperty") => match raw.get("value").and_then(decode_point) {
            Some(point) => PropertyValue::GeoProperty { point },
            None => PropertyValue::property(raw.get("value").cloned().unwrap_or(Value::Null)),
        },
        Some("Relationship") => match raw.get("object").and_then(Value::as_str) {
            Some(object) => PropertyValue::relationship(object),
            None => PropertyValue::property(raw.clone()),
        },
        _ => PropertyValue::property(raw.clone()),
    }
}

fn decode_point(geometry: &Value) -> Option<GeoPoint> {
    if geometry.get("type").and_then(Value::as_str) != Some("Point") {
        return None;
    }
    let coordinates = geometry.get("coordinates")?.as_array()?;
    match coordinates.as_slice() {
        [lon, lat, ..] => Some(GeoPoint {
            lon: lon.as_f64()?,
            lat: lat.as_f64()?,
        }),
        _ => None,
    }
}

/// RFC-3339 with a `Z` suffix and whole seconds
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Find a timestamp in a JSON value: an RFC-3339 string, a typed literal
/// `{"@type": "DateTime", "@value": ...}`, or a `Property` wrapping either.
pub fn timestamp_in(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => parse_timestamp(raw),
        Value::Object(object) => object
            .get("@value")
            .or_else(|| object.get("value"))
            .and_then(timestamp_in),
        _ => None,
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}
