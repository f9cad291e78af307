//! The event relay: consumes reader events in order, maps each to an
//! outbound envelope and broadcasts it. A card insertion spawns one read
//! task so other events keep flowing while the read is outstanding; the
//! read itself cannot be cancelled and is never retried.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use super::messages::Envelope;
use super::query::QueryStore;
use super::reader::{CardInfo, CardRead, ReaderEvent};

pub struct Relay {
    store: Arc<QueryStore>,
    reader: Arc<dyn CardRead>,
    outbound: broadcast::Sender<Envelope>,
    exit_on_read_error: bool,
}

impl Relay {
    pub fn new(
        store: Arc<QueryStore>,
        reader: Arc<dyn CardRead>,
        outbound: broadcast::Sender<Envelope>,
        exit_on_read_error: bool,
    ) -> Self {
        Self {
            store,
            reader,
            outbound,
            exit_on_read_error,
        }
    }

    /// Runs until the event source closes its end of the channel.
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<ReaderEvent>) {
        while let Some(event) = events.recv().await {
            self.dispatch(event);
        }
        tracing::info!("reader event source closed, relay stopping");
    }

    fn dispatch(&self, event: ReaderEvent) {
        match event {
            ReaderEvent::DeviceActivated { device, devices } => {
                // Log-only; the wire contract has no activation message.
                tracing::info!("Device '{device}' activated, devices: [{}]", devices.join(", "));
            }
            ReaderEvent::CardInserted { card } => self.on_card_inserted(card),
            ReaderEvent::CardRemoved { device } => {
                let message = format!("Card removed from '{device}'");
                tracing::info!("{message}");
                self.publish(Envelope::removed(message));
            }
            ReaderEvent::DeviceError { device, detail } => {
                tracing::warn!(%device, %detail, "device error");
                self.publish(Envelope::incorrect("Incorrect card input"));
            }
            ReaderEvent::DeviceDeactivated { device, devices } => {
                let message =
                    format!("Device '{device}' deactivated, devices: [{}]", devices.join(", "));
                tracing::error!("{message}");
                self.publish(Envelope::not_found(message));
            }
            ReaderEvent::SourceError { detail } => {
                tracing::error!("reader source error: {detail}");
                self.publish(Envelope::not_found(detail));
            }
        }
    }

    fn on_card_inserted(&self, card: CardInfo) {
        let message = format!("Card '{}' inserted into '{}'", card.atr_hex(), card.device);
        tracing::info!("{message}");
        self.publish(Envelope::inserted(message));

        let store = Arc::clone(&self.store);
        let reader = Arc::clone(&self.reader);
        let outbound = self.outbound.clone();
        let exit_on_read_error = self.exit_on_read_error;
        tokio::spawn(async move {
            let query = store.current();
            match reader.read(&card, &query).await {
                Ok(data) => {
                    tracing::debug!(device = %card.device, ?data, "card read completed");
                    let _ = outbound.send(Envelope::data(data));
                }
                Err(err) => {
                    tracing::error!(device = %card.device, error = %err, "card read failed");
                    let _ = outbound.send(Envelope::read_error(format!("Exception: {err}")));
                    if exit_on_read_error {
                        // Recovery is the supervisor's job from here on.
                        std::process::exit(0);
                    }
                }
            }
        });
    }

    fn publish(&self, envelope: Envelope) {
        // An Err simply means nobody is connected right now.
        if self.outbound.send(envelope).is_err() {
            tracing::debug!("no connected clients, broadcast dropped");
        }
    }
}
