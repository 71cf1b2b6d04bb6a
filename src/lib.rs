pub mod appresult;
pub mod config;
pub mod rooms;

use std::time::Duration;

use anyhow::{Context, bail};
use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, HeaderValue, Method, header},
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

pub use appresult::{AppError, AppResult};
pub use config::Config;

use rooms::Registry;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub registry: Registry,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            registry: Registry::new(config.hub(), config.lifetime()),
        }
    }
}

pub fn app(state: AppState, config: &Config) -> anyhow::Result<Router> {
    Ok(Router::new()
        .merge(rooms::router())
        .with_state(state)
        .layer(cors(&config.allowed_origins)?)
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout)))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid)))
}

fn cors(origins: &[String]) -> anyhow::Result<CorsLayer> {
    // credentials are allowed, which tower-http refuses to combine with a wildcard
    if origins.iter().any(|origin| origin.trim() == "*") {
        bail!("wildcard CORS origin is not allowed with credentials; list origins explicitly");
    }

    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).with_context(|| format!("invalid CORS origin {origin:?}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-csrf-token"),
        ])
        .expose_headers([header::LINK])
        .allow_credentials(true)
        .max_age(Duration::from_secs(300)))
}
