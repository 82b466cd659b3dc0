use schema::proto::booking_server::BookingServer;
use tonic::transport::Server as TonicServer;

use server::{BookingService, Config, FlightEvents, MemoryStore};

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env()?;
    let store = MemoryStore::from_csv_dir(&config.data_dir, chrono::Local::now().naive_local())?;

    let (events, process_events) = FlightEvents::new();
    let server = BookingServer::new(BookingService::new(store, config.rules, events));

    log::info!("running server on {}", config.socket);

    let (served, ()) = futures::join!(
        TonicServer::builder().add_service(server).serve(config.socket),
        process_events
    );
    served?;

    Ok(())
}
