#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, json};
use tokio::sync::{broadcast, mpsc};

use smc_agent::config::Config;
use smc_agent::domain::query::{Query, QueryStore};
use smc_agent::domain::reader::{CardInfo, CardRead, ReadError, ReadResult, ReaderEvent};
use smc_agent::domain::relay::Relay;
use smc_agent::server::{AppState, Server};

// Helper function to spawn a test server on a random port
pub async fn spawn_server() -> (String, AppState) {
    let mut env_vars = HashMap::new();
    env_vars.insert("server.host".to_string(), "127.0.0.1".to_string());
    // Use a random OS port
    env_vars.insert("server.port".to_string(), "0".to_string());
    let config = Config::load_with_sources(Some(env_vars)).expect("failed to load config");

    let (outbound, _) = broadcast::channel(64);
    let state = AppState {
        store: Arc::new(QueryStore::default()),
        outbound,
    };

    let server = Server::new(state.clone(), &config)
        .await
        .expect("failed to build server");
    let port = server.port().expect("failed to read bound port");
    tokio::spawn(async move {
        server.run().await.expect("failed to run server");
    });

    (format!("127.0.0.1:{port}"), state)
}

/// Wires a relay into the server's state, fed by the returned event sender.
pub fn spawn_relay(
    state: &AppState,
    reader: Arc<dyn CardRead>,
) -> mpsc::UnboundedSender<ReaderEvent> {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let relay = Relay::new(
        Arc::clone(&state.store),
        reader,
        state.outbound.clone(),
        false,
    );
    tokio::spawn(relay.run(events_rx));
    events_tx
}

/// Read capability standing in for a card that knows its balance.
pub struct BalanceCardRead;

#[async_trait]
impl CardRead for BalanceCardRead {
    async fn read(&self, _card: &CardInfo, query: &Query) -> ReadResult {
        let mut fields = Map::new();
        fields.insert("balance".to_string(), json!(42));
        Ok(query.select(fields))
    }
}

/// Read capability that always fails the way a wedged reader does.
pub struct TimeoutCardRead;

#[async_trait]
impl CardRead for TimeoutCardRead {
    async fn read(&self, _card: &CardInfo, _query: &Query) -> ReadResult {
        Err(ReadError::Capability("timeout".to_string()))
    }
}

pub fn sample_card() -> CardInfo {
    CardInfo {
        device: "ACME Reader 0".to_string(),
        atr: vec![0x3B, 0x65, 0x00],
    }
}
