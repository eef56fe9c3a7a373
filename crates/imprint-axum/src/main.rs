#![doc = include_str!("../README.md")]

mod config;

use axum::extract::State;
use axum::http::header::{ACCEPT_LANGUAGE, AsHeaderName, COOKIE, SET_COOKIE, USER_AGENT};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse};
use axum::routing::get;
use axum::Router;
use clap::Parser;
use config::{CliArgs, ServerConfig};
use imprint::{
    AllocationRegistry, ClientIdentityResolver, ClientSignals, IdentityStore, JsonIdentityStore,
    MemoryIdentityCache, MemoryIdentityStore, SystemClock,
};
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

/// Cookie carrying a previously issued identifier. Requests presenting it
/// skip fingerprinting entirely.
const IDENTITY_COOKIE: &str = "client_id";

struct AppState<S: IdentityStore + 'static> {
    resolver: Arc<ClientIdentityResolver<S, MemoryIdentityCache>>,
}

impl<S: IdentityStore + 'static> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            resolver: Arc::clone(&self.resolver),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match config.store_path.clone() {
        Some(path) => run(JsonIdentityStore::open(path)?, config).await,
        None => run(MemoryIdentityStore::new(), config).await,
    }
}

async fn run<S: IdentityStore + 'static>(store: S, config: ServerConfig) -> anyhow::Result<()> {
    let store = Arc::new(store);
    let cache = Arc::new(MemoryIdentityCache::new(config.cache_ttl));
    let registry = Arc::new(AllocationRegistry::new());

    // Must complete before the first request: the allocator's collision
    // check only sees identifiers the registry knows about.
    registry.bootstrap(store.as_ref());

    tracing::info!(
        addr = %config.addr,
        known_ids = registry.len(),
        "starting identity server"
    );

    let state = AppState {
        resolver: Arc::new(ClientIdentityResolver::new(
            registry,
            store,
            cache,
            SystemClock,
        )),
    };

    let app = Router::new()
        .route("/whoami", get(whoami::<S>))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("identity server shut down");
    Ok(())
}

/// Resolves the caller's stable identifier and re-issues it as a cookie so
/// subsequent requests can take the cookie fast path.
async fn whoami<S: IdentityStore + 'static>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StatusCode> {
    let signals = signals_from_headers(&headers);
    let resolver = Arc::clone(&state.resolver);

    // Resolution may touch the durable store on a cache miss; keep that off
    // the async workers.
    let user_id = tokio::task::spawn_blocking(move || resolver.resolve(&signals))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let cookie = format!("{IDENTITY_COOKIE}={user_id}; Path=/; Max-Age=31536000; SameSite=Lax");
    Ok((AppendHeaders([(SET_COOKIE, cookie)]), user_id))
}

fn signals_from_headers(headers: &HeaderMap) -> ClientSignals {
    ClientSignals {
        identity_cookie: cookie_value(headers, IDENTITY_COOKIE),
        user_agent: header_str(headers, USER_AGENT),
        accept_language: header_str(headers, ACCEPT_LANGUAGE),
        client_hints: header_str(headers, "sec-ch-ua"),
    }
}

fn header_str<K: AsHeaderName>(headers: &HeaderMap, name: K) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_owned())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn signals_pull_the_identity_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US"));
        headers.insert("sec-ch-ua", HeaderValue::from_static("\"Chromium\";v=120"));

        let signals = signals_from_headers(&headers);
        assert_eq!(signals.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(signals.accept_language.as_deref(), Some("en-US"));
        assert_eq!(signals.client_hints.as_deref(), Some("\"Chromium\";v=120"));
        assert_eq!(signals.identity_cookie, None);
    }

    #[test]
    fn cookie_value_finds_the_identity_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; client_id=ab12; lang=en"),
        );
        assert_eq!(cookie_value(&headers, IDENTITY_COOKIE), Some("ab12".into()));
        assert_eq!(cookie_value(&headers, "session"), None);
    }
}
