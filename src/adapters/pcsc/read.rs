//! Default read capability. Connects to the named reader and gathers what
//! can be read without card-specific knowledge: the ATR and, where the
//! reader supports the GET DATA pseudo-APDU, the contactless UID. The
//! query then filters the gathered fields.

use std::ffi::CString;

use async_trait::async_trait;
use pcsc::{Context, Protocols, Scope, ShareMode};
use serde_json::{Map, json};

use crate::domain::query::Query;
use crate::domain::reader::{CardInfo, CardRead, ReadError, ReadResult};

/// GET DATA for the contactless UID (PC/SC part 3 pseudo-APDU).
const GET_UID: [u8; 5] = [0xFF, 0xCA, 0x00, 0x00, 0x00];

#[derive(Debug, Default)]
pub struct PcscCardRead;

#[async_trait]
impl CardRead for PcscCardRead {
    async fn read(&self, card: &CardInfo, query: &Query) -> ReadResult {
        let card = card.clone();
        let query = query.clone();
        tokio::task::spawn_blocking(move || read_blocking(&card, &query))
            .await
            .map_err(|err| ReadError::Io(format!("read task failed: {err}")))?
    }
}

fn read_blocking(card: &CardInfo, query: &Query) -> ReadResult {
    let context = Context::establish(Scope::User).map_err(to_read_error)?;
    let reader = CString::new(card.device.as_str())
        .map_err(|_| ReadError::Device(format!("invalid reader name: {}", card.device)))?;
    let handle = context
        .connect(&reader, ShareMode::Shared, Protocols::ANY)
        .map_err(to_read_error)?;

    let mut fields = Map::new();
    fields.insert("device".to_string(), json!(card.device));
    fields.insert("atr".to_string(), json!(card.atr_hex()));

    // UID is best-effort; contact cards reject the pseudo-APDU.
    let mut buffer = [0u8; pcsc::MAX_BUFFER_SIZE];
    match handle.transmit(&GET_UID, &mut buffer) {
        Ok(response) if response.len() >= 2 => {
            let (payload, status) = response.split_at(response.len() - 2);
            if status == [0x90, 0x00] {
                fields.insert("uid".to_string(), json!(hex::encode_upper(payload)));
            } else {
                tracing::debug!(
                    device = %card.device,
                    "GET DATA refused with status {:02X}{:02X}", status[0], status[1]
                );
            }
        }
        Ok(_) => {}
        Err(err) => {
            tracing::debug!(device = %card.device, "GET DATA not supported: {err}");
        }
    }

    Ok(query.select(fields))
}

fn to_read_error(err: pcsc::Error) -> ReadError {
    match err {
        pcsc::Error::NoSmartcard
        | pcsc::Error::RemovedCard
        | pcsc::Error::UnknownReader
        | pcsc::Error::ReaderUnavailable => ReadError::Device(err.to_string()),
        other => ReadError::Io(other.to_string()),
    }
}
