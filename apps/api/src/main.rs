use std::net::SocketAddr;
use std::sync::Arc;

use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use booking_cell::BookingState;
use notification_cell::services::SupabaseNotifier;
use payment_cell::services::MercadoPagoClient;
use payment_cell::PaymentState;
use shared_config::AppConfig;
use shared_database::SupabaseStore;
use shared_utils::BusinessClock;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Agenda API server");

    let config = Arc::new(AppConfig::from_env());
    if !config.is_configured() {
        warn!("Supabase is not fully configured, requests touching storage will fail");
    }

    // Collaborators shared by every cell
    let store = Arc::new(SupabaseStore::new(&config));
    let gateway = Arc::new(MercadoPagoClient::new(&config));
    let notifier = Arc::new(SupabaseNotifier::new(&config));
    let clock = Arc::new(BusinessClock::new(config.business_utc_offset_minutes));

    let bookings = Arc::new(BookingState::new(
        config.clone(),
        store.clone(),
        notifier.clone(),
        clock.clone(),
    ));
    let payments = Arc::new(PaymentState::new(config.clone(), store, gateway, notifier, clock));

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(bookings, payments)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
