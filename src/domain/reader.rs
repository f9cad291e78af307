//! Ports for the reader side of the relay: the typed events a reader
//! source emits and the capability used to read an inserted card. These
//! keep the relay free of any PC/SC types; adapters map the driver's shape
//! into this one.

use async_trait::async_trait;
use serde_json::Value;

use super::query::Query;

/// Result type for card read operations
pub type ReadResult = Result<Value, ReadError>;

/// Errors a read capability can surface
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("card I/O failed: {0}")]
    Io(String),

    #[error("device not available: {0}")]
    Device(String),

    /// A failure reported verbatim by a read capability.
    #[error("{0}")]
    Capability(String),
}

/// Descriptor for an inserted card. The ATR is captured at insertion time;
/// the actual connection is (re-)established by the read capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardInfo {
    /// Name of the device the card was inserted into.
    pub device: String,
    /// Answer-to-reset bytes reported by the reader.
    pub atr: Vec<u8>,
}

impl CardInfo {
    pub fn atr_hex(&self) -> String {
        hex::encode_upper(&self.atr)
    }
}

/// Events emitted by a card reader source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderEvent {
    /// A reader appeared. `devices` is the full list currently known.
    DeviceActivated {
        device: String,
        devices: Vec<String>,
    },
    /// A reader disappeared.
    DeviceDeactivated {
        device: String,
        devices: Vec<String>,
    },
    CardInserted {
        card: CardInfo,
    },
    CardRemoved {
        device: String,
    },
    /// A device-level fault (unresponsive or misread card).
    DeviceError {
        device: String,
        detail: String,
    },
    /// A fault in the reader source itself.
    SourceError {
        detail: String,
    },
}

/// The read capability: given an inserted card and the current query,
/// produce the data to broadcast. May issue any number of APDU exchanges
/// internally. Runs to completion or failure; the relay never cancels it.
#[async_trait]
pub trait CardRead: Send + Sync {
    async fn read(&self, card: &CardInfo, query: &Query) -> ReadResult;
}
