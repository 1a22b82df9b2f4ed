//! OpenWeather current weather (`/data/2.5/weather?q=<city>`)

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::entity::jsonld::format_timestamp;
use crate::entity::{Entity, EntityId, PropertyValue};

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentWeather {
    #[serde(default)]
    pub coord: Option<Coord>,
    #[serde(default)]
    pub weather: Vec<Condition>,
    #[serde(default)]
    pub main: Option<MainReadings>,
    #[serde(default)]
    pub wind: Option<Wind>,
    /// Observation time, unix seconds
    pub dt: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sys: Option<Sys>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Coord {
    pub lon: f64,
    pub lat: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MainReadings {
    pub temp: Option<f64>,
    pub feels_like: Option<f64>,
    pub pressure: Option<f64>,
    pub humidity: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Wind {
    pub speed: Option<f64>,
    pub deg: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sys {
    #[serde(default)]
    pub country: Option<String>,
}

/// UN/CEFACT unit codes for the `units=` OpenWeather was queried with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitCodes {
    pub temperature: &'static str,
    pub wind_speed: &'static str,
}

impl UnitCodes {
    pub fn for_units(units: &str) -> Self {
        match units.to_ascii_lowercase().as_str() {
            "imperial" => Self {
                temperature: "FAH",
                wind_speed: "HM",
            },
            "standard" => Self {
                temperature: "KEL",
                wind_speed: "MTS",
            },
            _ => Self {
                temperature: "CEL",
                wind_speed: "MTS",
            },
        }
    }
}

/// Convert one current-weather response.
///
/// The entity is keyed by the city that was asked for rather than the name
/// OpenWeather echoes back, so a later get-by-id routes to the same query.
pub fn current_weather_to_entity(weather: &CurrentWeather, requested_city: &str, units: UnitCodes) -> Entity {
    let mut entity = Entity::from_id(&EntityId::weather(requested_city));

    entity.insert(
        "name",
        PropertyValue::property(weather.name.clone().unwrap_or_else(|| requested_city.to_string())),
    );

    if let Some(coord) = &weather.coord {
        entity.insert("location", PropertyValue::point(coord.lon, coord.lat));
    }

    let country = weather.sys.as_ref().and_then(|s| s.country.as_deref());
    let mut address = Map::new();
    address.insert("addressLocality".to_string(), json!(requested_city));
    if let Some(code) = country {
        address.insert("addressCountry".to_string(), json!(code));
        entity.insert(
            "refCountry",
            PropertyValue::relationship(EntityId::country(code).to_urn()),
        );
    }
    entity.insert("address", PropertyValue::property(Value::Object(address)));

    if let Some(main) = &weather.main {
        if let Some(temp) = main.temp {
            entity.insert("temperature", PropertyValue::measured(temp, units.temperature));
        }
        if let Some(feels_like) = main.feels_like {
            entity.insert(
                "feelsLikeTemperature",
                PropertyValue::measured(feels_like, units.temperature),
            );
        }
        if let Some(humidity) = main.humidity {
            entity.insert("relativeHumidity", PropertyValue::measured(humidity / 100.0, "P1"));
        }
        if let Some(pressure) = main.pressure {
            entity.insert("atmosphericPressure", PropertyValue::measured(pressure, "HPA"));
        }
    }

    if let Some(wind) = &weather.wind {
        if let Some(speed) = wind.speed {
            entity.insert("windSpeed", PropertyValue::measured(speed, units.wind_speed));
        }
        if let Some(deg) = wind.deg {
            entity.insert("windDirection", PropertyValue::measured(deg, "DD"));
        }
    }

    if let Some(condition) = weather.weather.first() {
        if let Some(main) = &condition.main {
            entity.insert("weatherType", PropertyValue::property(main.as_str()));
        }
        if let Some(description) = &condition.description {
            entity.insert("description", PropertyValue::property(description.as_str()));
        }
    }

    if let Some(observed) = DateTime::<Utc>::from_timestamp(weather.dt, 0) {
        entity.insert("dateObserved", PropertyValue::property(format_timestamp(observed)));
        entity.observed_at = Some(observed);
    }

    entity
}
