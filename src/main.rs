use std::sync::Arc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mentorbook::{
    api,
    config::Settings,
    notifications::{HttpSink, LogSink, NotificationDispatcher},
    payments::StripeGateway,
    service::PaymentServices,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mentorbook=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration; Stripe keys have no sensible default, so fail loudly
    let settings = Settings::new()?;

    tracing::info!("Starting mentorbook on {}:{}", settings.server.host, settings.server.port);

    // Initialize database
    let connect_options = SqliteConnectOptions::from_str(&settings.database.url)?
        .create_if_missing(true);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect_with(connect_options)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let gateway = Arc::new(StripeGateway::new(
        settings.stripe.secret_key.clone(),
        settings.stripe.webhook_secret.clone(),
        settings.stripe.success_url.clone(),
        settings.stripe.cancel_url.clone(),
    ));

    // Notification sinks
    let notifier = Arc::new(NotificationDispatcher::new());
    notifier.register(Arc::new(LogSink)).await;
    if let Some(http) = HttpSink::new(&settings.notifications) {
        notifier.register(Arc::new(http)).await;
    } else {
        tracing::info!("No notification service configured; notifications are logged only");
    }

    let services = Arc::new(PaymentServices::from_pool(
        db_pool.clone(),
        gateway,
        notifier,
        &settings.payments,
        &settings.reconciliation,
    ));

    let reconciliation = if settings.reconciliation.enabled {
        tracing::info!(
            "Reconciliation sweep every {}s",
            settings.reconciliation.interval_secs
        );
        Some(services.reconciler.clone().spawn())
    } else {
        tracing::warn!("Reconciliation sweep disabled");
        None
    };

    let app = api::create_app(services, Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(
        format!("{}:{}", settings.server.host, settings.server.port)
    ).await?;

    tracing::info!("Server listening on http://{}:{}", settings.server.host, settings.server.port);

    axum::serve(listener, app).await?;

    if let Some(handle) = reconciliation {
        handle.abort();
    }

    Ok(())
}
