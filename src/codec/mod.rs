//! Provider payload conversion
//!
//! Pure functions from a provider's JSON response to canonical [`Entity`]
//! values. No I/O happens here; the HTTP side lives in `sources`.
//!
//! [`Entity`]: crate::entity::Entity

pub mod openaq;
pub mod openweather;

pub use openaq::{CountriesResponse, LocationsResponse};
pub use openweather::CurrentWeather;
