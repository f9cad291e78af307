use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, Method, StatusCode},
    response::Html,
    routing::get,
};
use color_eyre::eyre::{Context as _, Result};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::domain::{messages::Envelope, query::QueryStore};

pub mod ws;

/// Shared handles every connection works against: the process-wide query
/// store and the broadcast channel the relay publishes to.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<QueryStore>,
    pub outbound: broadcast::Sender<Envelope>,
}

pub struct Server {
    router: Router,
    listener: TcpListener,
}

impl Server {
    pub async fn new(state: AppState, config: &Config) -> Result<Self> {
        let trace_layer =
            TraceLayer::new_for_http().make_span_with(|request: &'_ axum::extract::Request<_>| {
                let uri = request.uri().to_string();
                tracing::info_span!("request", method = %request.method(), uri)
            });

        // Production pins the channel to the serving origin; anything else
        // is wide open for local development against the demo page.
        let cors_layer = if config.environment.is_production() {
            let origin = format!("http://{}:{}", config.server.host, config.server.port)
                .parse::<HeaderValue>()
                .context("Building CORS origin")?;
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET])
        } else {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods([Method::GET])
        };

        let mut router = Router::new()
            .route("/health", get(health_check))
            .route("/ws", get(ws::ws_handler));
        if !config.environment.is_production() {
            router = router.route("/", get(demo_page));
        }
        let router = router
            .layer(cors_layer)
            .layer(trace_layer)
            .with_state(state);

        let addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = TcpListener::bind(&addr)
            .await
            .context("Binding TCP listener")?;

        Ok(Self { router, listener })
    }

    /// The port actually bound, useful when configured with port 0.
    pub fn port(&self) -> Result<u16> {
        Ok(self
            .listener
            .local_addr()
            .context("Getting local address")?
            .port())
    }

    pub async fn run(self) -> Result<()> {
        tracing::info!("listening on *:{}", self.port()?);
        axum::serve(self.listener, self.router)
            .await
            .context("Running server")?;
        Ok(())
    }
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

async fn demo_page() -> Html<&'static str> {
    Html(include_str!("../static/example.html"))
}
