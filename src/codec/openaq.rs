//! OpenAQ v3 payloads
//!
//! `GET /locations` becomes one `AirQualityObserved` entity per station,
//! `GET /countries/{id}` one `Country` entity per result.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::entity::jsonld::parse_timestamp;
use crate::entity::{Entity, EntityId, PropertyValue};

#[derive(Debug, Clone, Deserialize)]
pub struct LocationsResponse {
    #[serde(default)]
    pub results: Vec<Location>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub locality: Option<String>,
    #[serde(default)]
    pub country: Option<CountryRef>,
    #[serde(default)]
    pub is_mobile: bool,
    #[serde(default)]
    pub is_monitor: bool,
    #[serde(default)]
    pub sensors: Vec<Sensor>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub datetime_first: Option<DateTimeValue>,
    #[serde(default)]
    pub datetime_last: Option<DateTimeValue>,
}

impl Location {
    /// Station locality, when OpenAQ has one
    pub fn locality(&self) -> Option<&str> {
        self.locality.as_deref().map(str::trim).filter(|l| !l.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountryRef {
    pub id: i64,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DateTimeValue {
    #[serde(default)]
    pub utc: Option<String>,
    #[serde(default)]
    pub local: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sensor {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parameter: Option<Parameter>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountriesResponse {
    #[serde(default)]
    pub results: Vec<CountryInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryInfo {
    pub id: i64,
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub datetime_first: Option<String>,
    #[serde(default)]
    pub datetime_last: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

/// Convert every station on a locations page.
///
/// Stations without a locality are filed under `requested_locality` so the
/// id still routes back to the fetch that produced it.
pub fn locations_to_entities(response: &LocationsResponse, requested_locality: &str) -> Vec<Entity> {
    response
        .results
        .iter()
        .map(|location| location_to_entity(location, requested_locality))
        .collect()
}

pub fn location_to_entity(location: &Location, requested_locality: &str) -> Entity {
    let locality = location.locality().unwrap_or(requested_locality);
    let mut entity = Entity::from_id(&EntityId::air_quality(locality, location.id));

    entity.insert(
        "name",
        PropertyValue::property(location.name.clone().unwrap_or_default()),
    );

    if let Some(coordinates) = &location.coordinates {
        entity.insert(
            "location",
            PropertyValue::point(coordinates.longitude, coordinates.latitude),
        );
    }

    entity.insert(
        "address",
        PropertyValue::property(json!({ "addressLocality": locality })),
    );

    if let Some(code) = location.country.as_ref().and_then(|c| c.code.as_deref()) {
        entity.insert(
            "refCountry",
            PropertyValue::relationship(EntityId::country(code).to_urn()),
        );
        entity.insert("countryCode", PropertyValue::property(code));
    }

    let sensors: Vec<Value> = location
        .sensors
        .iter()
        .filter_map(|sensor| sensor.parameter.as_ref())
        .map(|p| {
            json!({
                "parameterId": p.id,
                "parameterName": p.name,
                "parameterDisplayName": p.display_name,
                "parameterUnits": p.units,
            })
        })
        .collect();
    if !sensors.is_empty() {
        entity.insert("sensors", PropertyValue::property(sensors));
    }

    entity.insert("isMobile", PropertyValue::property(location.is_mobile));
    entity.insert("isMonitor", PropertyValue::property(location.is_monitor));

    if let Some(first) = utc_of(&location.datetime_first) {
        entity.insert("dateCreated", PropertyValue::property(first));
    }
    if let Some(last) = utc_of(&location.datetime_last) {
        entity.insert("dateModified", PropertyValue::property(last));
        entity.insert("dateObserved", PropertyValue::property(last));
        if let Some(observed_at) = parse_timestamp(last) {
            entity.observed_at = Some(observed_at);
        }
    }

    entity
}

fn utc_of(value: &Option<DateTimeValue>) -> Option<&str> {
    value
        .as_ref()
        .and_then(|v| v.utc.as_deref())
        .filter(|s| !s.is_empty())
}

pub fn countries_to_entities(response: &CountriesResponse) -> Vec<Entity> {
    response.results.iter().map(country_to_entity).collect()
}

pub fn country_to_entity(country: &CountryInfo) -> Entity {
    let code = country.code.trim().to_ascii_uppercase();
    let mut entity = Entity::from_id(&EntityId::country(&code));

    entity.insert(
        "name",
        PropertyValue::property(country.name.clone().unwrap_or_default()),
    );
    entity.insert("code", PropertyValue::property(code.as_str()));
    entity.insert("countryCode", PropertyValue::property(code.as_str()));
    entity.insert("providerId", PropertyValue::property(country.id));

    if let Some(first) = country.datetime_first.as_deref().filter(|s| !s.is_empty()) {
        entity.insert("dateCreated", PropertyValue::property(first));
    }
    if let Some(last) = country.datetime_last.as_deref().filter(|s| !s.is_empty()) {
        entity.insert("dateModified", PropertyValue::property(last));
        entity.insert("dateObserved", PropertyValue::property(last));
        entity.observed_at = parse_timestamp(last);
    }

    if !country.parameters.is_empty() {
        let parameters: Vec<Value> = country
            .parameters
            .iter()
            .map(|p| {
                json!({
                    "id": p.id,
                    "name": p.name,
                    "displayName": p.display_name,
                    "units": p.units,
                })
            })
            .collect();
        entity.insert("availableParameters", PropertyValue::property(parameters));
    }

    entity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityType;

    fn locations() -> LocationsResponse {
        serde_json::from_value(json!({
            "meta": {"found": 2},
            "results": [
                {
                    "id": 8118,
                    "name": "US Diplomatic Post: Hanoi",
                    "locality": "Hanoi",
                    "country": {"id": 56, "code": "VN", "name": "Vietnam"},
                    "isMobile": false,
                    "isMonitor": true,
                    "sensors": [
                        {"id": 1, "name": "pm25 µg/m³", "parameter": {"id": 2, "name": "pm25", "units": "µg/m³", "displayName": "PM2.5"}}
                    ],
                    "coordinates": {"latitude": 21.0219, "longitude": 105.8189},
                    "datetimeFirst": {"utc": "2016-01-30T01:00:00Z", "local": "2016-01-30T08:00:00+07:00"},
                    "datetimeLast": {"utc": "2025-03-01T08:00:00Z", "local": "2025-03-01T15:00:00+07:00"}
                },
                {
                    "id": 9001,
                    "name": "Unnamed",
                    "locality": null,
                    "coordinates": null
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_location_entity() {
        let entities = locations_to_entities(&locations(), "Ho Chi Minh City");
        assert_eq!(entities.len(), 2);

        let hanoi = &entities[0];
        assert_eq!(hanoi.id, "urn:ngsi-ld:AirQualityObserved:Hanoi:8118");
        assert_eq!(hanoi.entity_type, EntityType::AirQualityObserved);
        assert_eq!(hanoi.property("location"), Some(&PropertyValue::point(105.8189, 21.0219)));
        assert_eq!(
            hanoi.property("refCountry"),
            Some(&PropertyValue::relationship("urn:ngsi-ld:Country:VN"))
        );
        assert_eq!(hanoi.value_at_path("address.addressLocality"), Some(json!("Hanoi")));
        assert_eq!(hanoi.value_at_path("dateObserved"), Some(json!("2025-03-01T08:00:00Z")));
        assert_eq!(hanoi.value_at_path("dateCreated"), Some(json!("2016-01-30T01:00:00Z")));
        let sensors = hanoi.value_at_path("sensors").unwrap();
        assert_eq!(sensors[0]["parameterName"], "pm25");
        assert!(hanoi.observed_at.is_some());
    }

    #[test]
    fn test_location_without_locality_uses_requested() {
        let entities = locations_to_entities(&locations(), "Ho Chi Minh City");
        let orphan = &entities[1];
        assert_eq!(orphan.id, "urn:ngsi-ld:AirQualityObserved:Ho%20Chi%20Minh%20City:9001");
        assert!(orphan.property("location").is_none());
        assert!(orphan.property("refCountry").is_none());
        assert!(orphan.property("dateObserved").is_none());
        assert_eq!(
            orphan.value_at_path("address.addressLocality"),
            Some(json!("Ho Chi Minh City"))
        );
    }

    #[test]
    fn test_country_entity() {
        let response: CountriesResponse = serde_json::from_value(json!({
            "results": [{
                "id": 56,
                "code": "VN",
                "name": "Vietnam",
                "datetimeFirst": "2016-01-30T01:00:00Z",
                "datetimeLast": "2025-03-01T08:00:00Z",
                "parameters": [{"id": 2, "name": "pm25", "units": "µg/m³", "displayName": "PM2.5"}]
            }]
        }))
        .unwrap();

        let entities = countries_to_entities(&response);
        assert_eq!(entities.len(), 1);
        let vn = &entities[0];
        assert_eq!(vn.id, "urn:ngsi-ld:Country:VN");
        assert_eq!(vn.value_at_path("countryCode"), Some(json!("VN")));
        assert_eq!(vn.value_at_path("code"), Some(json!("VN")));
        assert_eq!(vn.value_at_path("providerId"), Some(json!(56)));
        assert_eq!(
            vn.value_at_path("availableParameters").map(|p| p.as_array().map(Vec::len)),
            Some(Some(1))
        );
        assert!(vn.observed_at.is_some());
    }
}
