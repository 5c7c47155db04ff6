//! BBO Stream - command line entry point
//!
//! Connects to the feed, subscribes to the configured symbol, logs every
//! best bid/offer snapshot and serves health and metrics over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bbo_stream::{Config, FeedClient, FeedMetrics, WsTransport};

type Client = FeedClient<WsTransport>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Starting BBO stream client");

    let config = Config::load()?;
    info!(symbol = %config.symbol, endpoint = %config.ws_endpoint, "Configuration loaded");

    let metrics = Arc::new(FeedMetrics::new()?);
    let client = Arc::new(FeedClient::from_config(&config, metrics));

    // Start health check server
    let health_client = client.clone();
    let health_port = config.health_port;
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_client, health_port).await {
            warn!(error = %e, "Health server error");
        }
    });

    client.connect().await?;
    client.subscribe(&config.symbol).await?;

    let (tx, mut rx) = mpsc::channel(config.delivery_queue_capacity);
    let dispatcher = {
        let client = client.clone();
        tokio::spawn(async move {
            if let Err(e) = client.run(tx).await {
                error!(error = %e, "Dispatch loop failed to start");
            }
        })
    };

    let mut keepalive = interval(config.keepalive_interval());
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
    keepalive.tick().await;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            book = rx.recv() => match book {
                Some(book) => info!(
                    bid_price = book.bid.price,
                    bid_amount = book.bid.amount,
                    ask_price = book.ask.price,
                    ask_amount = book.ask.amount,
                    spread = book.spread(),
                    "Best order book"
                ),
                None => {
                    warn!("Delivery queue closed");
                    client.disconnect().await;
                    break;
                }
            },
            _ = keepalive.tick() => client.send_ping().await,
            _ = &mut ctrl_c => {
                info!("Interrupt received, shutting down");
                client.disconnect().await;
                break;
            }
        }
    }

    if let Err(e) = dispatcher.await {
        warn!(error = %e, "Dispatch task panicked");
    }

    info!("Shutdown");
    Ok(())
}

/// Start HTTP server for health checks and metrics
async fn start_health_server(client: Arc<Client>, port: u16) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .with_state(client);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(addr = %addr, "Starting health check server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check(State(client): State<Arc<Client>>) -> Json<serde_json::Value> {
    let status = if client.is_shutting_down() {
        "stopping"
    } else {
        "healthy"
    };

    Json(serde_json::json!({
        "status": status,
        "component": "bbo-stream",
        "state": format!("{:?}", client.state()),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn metrics(State(client): State<Arc<Client>>) -> Result<String, StatusCode> {
    client.metrics().encode().map_err(|e| {
        warn!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
