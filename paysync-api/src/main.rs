use anyhow::Context;
use paysync_api::{app, middleware::AuthPipeline, AppState};
use paysync_core::PaymentLedger;
use paysync_order::ReconciliationEngine;
use paysync_store::app_config::{Config, LedgerBackend};
use paysync_store::{
    http_client, DbClient, HttpTokenVerifier, InMemoryPaymentLedger, PeerServiceClient, PgPaymentLedger,
    StripeGateway,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "paysync_api=debug,paysync_order=debug,paysync_store=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting PaySync API on port {}", config.server.port);

    let ledger: Arc<dyn PaymentLedger> = match config.ledger.backend {
        LedgerBackend::Postgres => {
            let db = DbClient::new(&config.database)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run ledger migrations")?;
            Arc::new(PgPaymentLedger::new(db.pool.clone()))
        }
        LedgerBackend::Memory => {
            tracing::warn!("Using the in-memory ledger; payments are lost on restart");
            Arc::new(InMemoryPaymentLedger::new())
        }
    };

    let client = http_client(config.upstream.timeout()).context("Failed to build HTTP client")?;
    let processor = Arc::new(StripeGateway::new(client.clone(), &config.processor));
    let verifier = Arc::new(HttpTokenVerifier::new(client.clone(), config.identity.base_url.clone()));
    let peer = Arc::new(PeerServiceClient::new(client, config.peer.base_url.clone()));

    let engine = ReconciliationEngine::new(ledger, processor, peer.clone(), peer.clone());

    let app_state = AppState {
        engine: Arc::new(engine),
        orders: peer,
        auth: Arc::new(AuthPipeline::authenticated(verifier)),
    };

    let app = app(app_state, &config.server.cors_origins);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
