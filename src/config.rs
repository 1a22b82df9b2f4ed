//! Configuration for the gateway
//!
//! CLI arguments and environment variable handling using clap. Every flag
//! can also be set through the environment (and a `.env` file, loaded in
//! `main`).

use clap::Parser;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// ngsi-gateway - cache-aside NGSI-LD context gateway
#[derive(Parser, Debug, Clone)]
#[command(name = "ngsi-gateway")]
#[command(about = "Cache-aside NGSI-LD gateway for air quality and weather observations")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// NGSI-LD context broker base URL (without /ngsi-ld/v1)
    #[arg(long, env = "ORION_ENDPOINT", default_value = "http://localhost:1026")]
    pub context_broker_url: String,

    /// Use the broker's batch upsert operation for write-back.
    /// When false, entities are upserted one at a time.
    #[arg(long, env = "BROKER_BATCH_UPSERT", default_value = "true")]
    pub broker_batch_upsert: bool,

    /// OpenAQ v3 API base URL
    #[arg(long, env = "OPENAQ_ENDPOINT", default_value = "https://api.openaq.org/v3")]
    pub openaq_url: String,

    /// OpenAQ API key (sent as X-API-Key)
    #[arg(long, env = "OPENAIR_API_KEY")]
    pub openaq_api_key: Option<String>,

    /// OpenWeather current weather endpoint
    #[arg(
        long,
        env = "OPENWEATHER_ENDPOINT",
        default_value = "https://api.openweathermap.org/data/2.5/weather"
    )]
    pub openweather_url: String,

    /// OpenWeather API key (sent as appid)
    #[arg(long, env = "OPENWEATHER_API_KEY")]
    pub openweather_api_key: Option<String>,

    /// Maximum age of a cached observation before it is refetched
    #[arg(long, env = "CACHE_TTL_SECS", default_value = "1800")]
    pub cache_ttl_secs: u64,

    /// Deadline for each upstream and broker call in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// How long a coalesced request waits for the in-flight fetch
    #[arg(long, env = "COALESCE_TIMEOUT_MS", default_value = "60000")]
    pub coalesce_timeout_ms: u64,

    /// Locality used when a request does not name one
    #[arg(long, env = "DEFAULT_LOCALITY", default_value = "Ho Chi Minh City")]
    pub default_locality: String,

    /// Country code used when a request does not name a known one
    #[arg(long, env = "DEFAULT_COUNTRY", default_value = "VN")]
    pub default_country: String,

    /// Country code to OpenAQ country id table, as CODE=ID pairs
    #[arg(long, env = "COUNTRY_IDS", default_value = "VN=56,TH=218,US=229,CN=46")]
    pub country_ids: String,

    /// OpenAQ parameter id used to select stations (2 = PM2.5)
    #[arg(long, env = "AIR_PARAMETERS_ID", default_value = "2")]
    pub air_parameters_id: u32,

    /// Maximum number of OpenAQ locations fetched per refresh
    #[arg(long, env = "AIR_LOCATION_LIMIT", default_value = "10")]
    pub air_location_limit: u32,

    /// OpenWeather units (standard, metric, imperial)
    #[arg(long, env = "WEATHER_UNITS", default_value = "metric")]
    pub weather_units: String,

    /// OpenWeather description language
    #[arg(long, env = "WEATHER_LANG", default_value = "en")]
    pub weather_lang: String,

    /// Enable development mode (in-memory entity store, no broker)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format (text or json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,
}

impl Args {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn coalesce_timeout(&self) -> Duration {
        Duration::from_millis(self.coalesce_timeout_ms)
    }

    /// Parsed country table with the configured default
    pub fn country_table(&self) -> Result<CountryTable, String> {
        self.country_ids
            .parse::<CountryTable>()?
            .with_default(&self.default_country)
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_ttl_secs == 0 {
            return Err("CACHE_TTL_SECS must be greater than zero".to_string());
        }

        if self.request_timeout_ms == 0 || self.coalesce_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS and COALESCE_TIMEOUT_MS must be greater than zero".to_string());
        }

        if self.air_location_limit == 0 {
            return Err("AIR_LOCATION_LIMIT must be greater than zero".to_string());
        }

        if !matches!(self.log_format.to_ascii_lowercase().as_str(), "text" | "json") {
            return Err(format!("LOG_FORMAT must be 'text' or 'json', got '{}'", self.log_format));
        }

        if self.default_locality.trim().is_empty() {
            return Err("DEFAULT_LOCALITY must not be empty".to_string());
        }

        self.country_table()?;

        Ok(())
    }
}

/// Country code to provider country id mapping
///
/// Read-only once built; injected into the country source.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryTable {
    ids: BTreeMap<String, u32>,
    default_code: String,
}

impl CountryTable {
    pub fn new(ids: impl IntoIterator<Item = (String, u32)>) -> Self {
        Self {
            ids: ids
                .into_iter()
                .map(|(code, id)| (code.to_ascii_uppercase(), id))
                .collect(),
            default_code: String::new(),
        }
    }

    /// Set the fallback country. It must be present in the table.
    pub fn with_default(mut self, code: &str) -> Result<Self, String> {
        let code = code.trim().to_ascii_uppercase();
        if !self.ids.contains_key(&code) {
            return Err(format!("default country '{}' is not in the country table", code));
        }
        self.default_code = code;
        Ok(self)
    }

    pub fn default_code(&self) -> &str {
        &self.default_code
    }

    pub fn get(&self, code: &str) -> Option<u32> {
        self.ids.get(&code.trim().to_ascii_uppercase()).copied()
    }

    /// Provider id for `code`, falling back to the default country.
    pub fn resolve(&self, code: &str) -> u32 {
        if let Some(id) = self.get(code) {
            return id;
        }
        warn!(
            country = %code,
            default = %self.default_code,
            "Unknown country code, using default country"
        );
        self.get(&self.default_code).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromStr for CountryTable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut ids = Vec::new();
        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (code, id) = pair
                .split_once('=')
                .ok_or_else(|| format!("country table entry '{}' is not CODE=ID", pair))?;
            let code = code.trim();
            if code.is_empty() {
                return Err(format!("country table entry '{}' has an empty code", pair));
            }
            let id = id
                .trim()
                .parse::<u32>()
                .map_err(|e| format!("country table entry '{}': {}", pair, e))?;
            ids.push((code.to_string(), id));
        }

        if ids.is_empty() {
            return Err("country table is empty".to_string());
        }

        Ok(Self::new(ids))
    }
}
