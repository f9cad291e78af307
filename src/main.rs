use std::sync::Arc;
use std::time::Duration;

use smc_agent::{
    adapters::pcsc::{PcscCardRead, ReaderMonitor},
    config::Config,
    domain::{messages::Envelope, query::QueryStore, reader::CardRead, relay::Relay},
    server::{AppState, Server},
    telemetry,
};
use tokio::sync::{broadcast, mpsc};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let config = Config::load()?;
    tracing::info!("Loaded configuration: {:?}", config);

    let store = Arc::new(QueryStore::default());
    let (outbound, _) = broadcast::channel(64);

    let state = AppState {
        store: Arc::clone(&store),
        outbound: outbound.clone(),
    };
    let server = Server::new(state, &config).await?;

    // Attach the reader only after the transport is up, and late enough
    // that a supervisor-restarted agent sees its clients reconnect and set
    // a query before the first card is read.
    let relay_config = config.relay.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(relay_config.startup_delay_ms)).await;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        if let Err(err) = ReaderMonitor::spawn(events_tx) {
            tracing::error!("failed to start reader monitor: {err}");
            let _ = outbound.send(Envelope::not_found(err.to_string()));
            return;
        }
        let reader: Arc<dyn CardRead> = Arc::new(PcscCardRead);
        Relay::new(store, reader, outbound, relay_config.exit_on_read_error)
            .run(events_rx)
            .await;
    });

    server.run().await
}
