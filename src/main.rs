use std::{sync::Arc, time::Duration};

use nail_booking::{
    backend::ReservationBackend, configuration::Configuration,
    configuration_handler::ConfigurationHandler, database_interface::DatabaseInterface,
    error::BookingError,
    http::create_app,
    identity::{spawn_identity_listener, LocalIdentity},
    local_store::LocalStore,
    week::SystemClock,
};
use tokio::{net::TcpListener, time::sleep};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("################");
    println!("# Nail Booking #");
    println!("################");

    let configuration = ConfigurationHandler::parse_arguments();

    let address = format!("0.0.0.0:{}", configuration.port());
    println!("Accessable at:\n{}", address.clone());
    let listener = match TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%err, "Failed to bind {address}");
            return;
        }
    };

    let result = if let Some(database_url) = configuration.database_url() {
        let backend = loop {
            match DatabaseInterface::new(&database_url) {
                Ok(backend) => {
                    info!("Successfully connected to database");
                    break backend;
                }
                Err(err) => {
                    error!(?err, "Failed to establish database connection: {database_url}. Retry in 1 sec. You may want to restart it with database disabled (reservations kept in memory).");
                    sleep(Duration::from_secs(1)).await;
                }
            }
        };
        serve(listener, backend, configuration).await
    } else {
        serve(listener, LocalStore::default(), configuration).await
    };

    if let Err(err) = result {
        error!(%err, "Server stopped");
    }
}

async fn serve<T: ReservationBackend>(
    listener: TcpListener,
    backend: T,
    configuration: ConfigurationHandler,
) -> Result<(), BookingError> {
    let identity = LocalIdentity::default();
    let identity_listener = spawn_identity_listener(&identity);

    let app = create_app(
        backend,
        configuration,
        Arc::new(identity),
        Arc::new(SystemClock),
    )?;

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(%err, "Failed to listen for shutdown signal");
            }
            info!("Shutting down");
        })
        .await;
    identity_listener.abort();

    served.map_err(|err| BookingError::Store(format!("Server error: {err}")))
}
