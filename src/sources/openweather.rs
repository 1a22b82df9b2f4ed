//! OpenWeather current weather by city

use reqwest::Client;
use tracing::debug;

use super::{decode_response, require_key, SourceAdapter};
use crate::codec::openweather::{current_weather_to_entity, CurrentWeather, UnitCodes};
use crate::entity::{Entity, EntityType};
use crate::types::Result;

/// `GET {url}?q=<city>&units=&lang=&appid=`
pub struct WeatherCitySource {
    client: Client,
    url: String,
    api_key: Option<String>,
    units: String,
    lang: String,
}

impl WeatherCitySource {
    pub fn new(client: Client, url: &str, api_key: Option<String>, units: &str, lang: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
            api_key,
            units: units.to_string(),
            lang: lang.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for WeatherCitySource {
    fn entity_type(&self) -> EntityType {
        EntityType::WeatherObserved
    }

    fn name(&self) -> &'static str {
        "openweather"
    }

    async fn fetch(&self, city: &str) -> Result<Vec<Entity>> {
        let api_key = require_key("OpenWeather", &self.api_key)?;

        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("q", city),
                ("units", self.units.as_str()),
                ("lang", self.lang.as_str()),
                ("appid", api_key),
            ])
            .send()
            .await?;

        let weather: CurrentWeather = decode_response(self.name(), response).await?;
        debug!(city = %city, observed = weather.dt, "Fetched OpenWeather current weather");

        Ok(vec![current_weather_to_entity(
            &weather,
            city,
            UnitCodes::for_units(&self.units),
        )])
    }
}
