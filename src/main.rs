use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use storefront_api::config::{init_tracing, load_config};
use storefront_api::db::{establish_connection, sync_schema};
use storefront_api::events::{process_events, EventSender};
use storefront_api::services::coupons::CouponService;
use storefront_api::services::inventory::InventoryService;
use storefront_api::services::notifications::NotificationService;
use storefront_api::services::orders::OrderService;
use storefront_api::services::payments::{PaymentGateway, RazorpayGateway};
use storefront_api::services::pricing::PricingService;
use storefront_api::services::settlement::SettlementService;
use storefront_api::{api_router, AppState};

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(load_config().context("Failed to load configuration")?);
    init_tracing(config.log_level(), config.log_json);

    info!(
        environment = %config.environment,
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let db = Arc::new(
        establish_connection(&config)
            .await
            .context("Failed to connect to the database")?,
    );
    if config.auto_migrate {
        sync_schema(&db).await.context("Schema sync failed")?;
        info!("Database schema synced");
    }

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let event_sender = EventSender::new(tx);
    let notifications = NotificationService::new(config.notification_url.clone());
    tokio::spawn(process_events(rx, notifications));

    let gateway: Arc<dyn PaymentGateway> =
        Arc::new(RazorpayGateway::from_config(&config).context("Failed to build gateway client")?);

    let orders = Arc::new(OrderService::new(db.clone()));
    let settlement = Arc::new(SettlementService::new(
        db.clone(),
        gateway,
        PricingService::new(db.clone()),
        CouponService::new(db.clone()),
        OrderService::new(db.clone()),
        InventoryService::new(),
        event_sender.clone(),
        config.currency.clone(),
        config.razorpay_key_secret.clone(),
    ));

    let state = AppState {
        db: db.clone(),
        config: config.clone(),
        event_sender,
        settlement,
        orders,
    };

    let app = api_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C; shutting down"),
        _ = terminate => info!("Received SIGTERM; shutting down"),
    }
}
