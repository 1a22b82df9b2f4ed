//! HTTP server implementation
//!
//! hyper http1 with TokioIo, one task per connection.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::cache::{CacheGateway, GatewayConfig};
use crate::config::Args;
use crate::routes::{self, EntityRoute, SyncTarget};
use crate::sources::{http_client, AirQualityLocationSource, CountrySource, SourceRegistry, WeatherCitySource};
use crate::store::{ContextBrokerClient, EntityStore, MemoryEntityStore};
use crate::types::{GatewayError, Result};

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub gateway: Arc<CacheGateway>,
    pub started_at: Instant,
}

impl AppState {
    /// Build the entity store, source adapters and gateway from configuration.
    ///
    /// Dev mode keeps entities in process instead of talking to a broker.
    pub fn new(args: Args) -> Result<Self> {
        let client = http_client(args.request_timeout())?;
        let countries = args.country_table().map_err(GatewayError::Config)?;

        let store: Arc<dyn EntityStore> = if args.dev_mode {
            Arc::new(MemoryEntityStore::memory_only())
        } else {
            Arc::new(ContextBrokerClient::new(
                client.clone(),
                &args.context_broker_url,
                args.broker_batch_upsert,
            ))
        };

        if args.openaq_api_key.is_none() {
            warn!("OPENAIR_API_KEY is not set, air quality and country lookups will fail");
        }
        if args.openweather_api_key.is_none() {
            warn!("OPENWEATHER_API_KEY is not set, weather lookups will fail");
        }

        let default_country = countries.default_code().to_string();
        let sources = SourceRegistry::new()
            .with(
                Arc::new(AirQualityLocationSource::new(
                    client.clone(),
                    &args.openaq_url,
                    args.openaq_api_key.clone(),
                    args.air_parameters_id,
                    args.air_location_limit,
                )),
                &args.default_locality,
            )
            .with(
                Arc::new(CountrySource::new(
                    client.clone(),
                    &args.openaq_url,
                    args.openaq_api_key.clone(),
                    countries,
                )),
                &default_country,
            )
            .with(
                Arc::new(WeatherCitySource::new(
                    client,
                    &args.openweather_url,
                    args.openweather_api_key.clone(),
                    &args.weather_units,
                    &args.weather_lang,
                )),
                &args.default_locality,
            );

        let config = GatewayConfig {
            ttl: args.cache_ttl(),
            request_timeout: args.request_timeout(),
            coalesce_timeout: args.coalesce_timeout(),
        };
        let gateway = Arc::new(CacheGateway::new(store, sources, config));

        Ok(Self::with_gateway(args, gateway))
    }

    /// State around an already built gateway
    pub fn with_gateway(args: Args, gateway: Arc<CacheGateway>) -> Self {
        Self {
            args,
            gateway,
            started_at: Instant::now(),
        }
    }
}

/// Run the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("ngsi-gateway listening on {}", state.args.listen);

    if state.args.dev_mode {
        warn!("Development mode enabled - entities are kept in memory only");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(|q| q.to_string());

    info!("[{}] {} {}", addr, method, path);

    Ok(route(state, &method, &path, query.as_deref()).await)
}

/// Dispatch a request by method and path.
///
/// Request bodies are never read; every route takes its input from the
/// path and query string.
pub async fn route(
    state: Arc<AppState>,
    method: &Method,
    path: &str,
    query: Option<&str>,
) -> Response<Full<Bytes>> {
    if method == Method::OPTIONS {
        return routes::preflight_response();
    }

    match (method, path) {
        (&Method::GET, "/health") => return routes::health_check(state),
        (&Method::GET, "/ready") => return routes::readiness_check(state).await,
        (&Method::GET, "/version") => return routes::version_info(),
        (&Method::GET, "/status") => return routes::status_check(state).await,
        _ => {}
    }

    if let Some(entity_route) = routes::match_entity_route(path) {
        if method != Method::GET {
            return routes::method_not_allowed_response(method, path);
        }
        return match entity_route {
            EntityRoute::Collection => routes::handle_query_entities(&state.gateway, query).await,
            EntityRoute::Item(id) => routes::handle_get_entity(&state.gateway, &id).await,
        };
    }

    if let Some(target) = SyncTarget::from_path(path) {
        if method != Method::POST {
            return routes::method_not_allowed_response(method, path);
        }
        return routes::handle_sync(&state.gateway, target, query).await;
    }

    routes::not_found_response(path)
}
