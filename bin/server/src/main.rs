use chatbridge_conversation::SessionRegistry;
use chatbridge_relay::{
    Connection, Dispatcher, DispatcherConfig, MemoryConnection, NatsConnection,
};
use chatbridge_server::{
    app::{self, AppState},
    config::{ServerConfig, TransportKind},
};
use chatbridge_transcript::TranscriptStore;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!(bot = config.bot_name(), transport = ?config.transport, "Loaded configuration");

    let connection: Arc<dyn Connection> = match config.transport {
        TransportKind::Nats => Arc::new(NatsConnection::new(config.nats.to_nats_config())),
        TransportKind::Loopback => Arc::new(MemoryConnection::echo()),
    };

    let store = TranscriptStore::open(&config.history_dir)
        .await
        .expect("failed to open history directory");
    let registry = Arc::new(SessionRegistry::new(config.bot_name(), Arc::new(store)));

    // Fails before anything is served if BOT_USERNAME is missing
    let dispatcher = Dispatcher::new(
        Arc::clone(&connection),
        registry,
        DispatcherConfig::new(config.bot_name()).with_reply_timeout(config.reply_timeout()),
    )
    .expect("BOT_USERNAME must be set");
    let dispatcher = Arc::new(dispatcher);

    connection
        .connect()
        .await
        .expect("failed to connect to messaging backend");

    let app = app::router(AppState::new(Arc::clone(&dispatcher), config.model_name.as_str()));

    let addr = config.bind_addr().expect("invalid API_HOST or API_PORT");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    if let Err(e) = dispatcher.shutdown().await {
        tracing::warn!(error = %e, "Failed to close messaging connection");
    }
    tracing::info!("Shut down");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT"),
        () = terminate => tracing::info!("Received SIGTERM"),
    }
}
