//! Reader monitor over the PC/SC status-change API. Runs on a dedicated
//! thread: `get_status_change` blocks, and everything interesting crosses
//! into async through an unbounded channel.

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use pcsc::{Context, ReaderState, Scope, State};
use tokio::sync::mpsc::UnboundedSender;

use crate::domain::reader::{CardInfo, ReaderEvent};

const POLL_TIMEOUT: Duration = Duration::from_secs(1);
const RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("failed to establish PC/SC context: {0}")]
    Pcsc(#[from] pcsc::Error),

    #[error("failed to spawn monitor thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub struct ReaderMonitor;

impl ReaderMonitor {
    /// Starts watching the PC/SC subsystem, pushing events into `events`.
    /// The monitor stops when the receiving side is dropped.
    pub fn spawn(events: UnboundedSender<ReaderEvent>) -> Result<(), MonitorError> {
        let context = Context::establish(Scope::User)?;
        thread::Builder::new()
            .name("smc-monitor".to_string())
            .spawn(move || run_loop(context, events))?;
        Ok(())
    }
}

fn run_loop(context: Context, events: UnboundedSender<ReaderEvent>) {
    let mut known_devices: Vec<String> = Vec::new();
    // Previously observed state and ATR per reader, to suppress duplicates.
    let mut card_states: HashMap<String, (State, Vec<u8>)> = HashMap::new();

    loop {
        let readers = match context.list_readers_owned() {
            Ok(readers) => readers,
            Err(pcsc::Error::NoReadersAvailable) => Vec::new(),
            Err(err) => {
                tracing::error!("failed to list readers: {err}");
                if events
                    .send(ReaderEvent::SourceError {
                        detail: err.to_string(),
                    })
                    .is_err()
                {
                    return;
                }
                thread::sleep(RETRY_DELAY);
                continue;
            }
        };
        let current_devices: Vec<String> = readers
            .iter()
            .map(|name| name.to_string_lossy().into_owned())
            .collect();

        // Reader arrival/departure, diffed against the last known list.
        for device in &current_devices {
            if !known_devices.contains(device) {
                card_states.insert(device.clone(), (State::UNAWARE, Vec::new()));
                if events
                    .send(ReaderEvent::DeviceActivated {
                        device: device.clone(),
                        devices: current_devices.clone(),
                    })
                    .is_err()
                {
                    return;
                }
            }
        }
        for device in &known_devices {
            if !current_devices.contains(device) {
                card_states.remove(device);
                if events
                    .send(ReaderEvent::DeviceDeactivated {
                        device: device.clone(),
                        devices: current_devices.clone(),
                    })
                    .is_err()
                {
                    return;
                }
            }
        }
        known_devices = current_devices;

        if known_devices.is_empty() {
            if events.is_closed() {
                return;
            }
            thread::sleep(RETRY_DELAY);
            continue;
        }

        let mut reader_states = vec![ReaderState::new(pcsc::PNP_NOTIFICATION(), State::UNAWARE)];
        for reader in readers {
            reader_states.push(ReaderState::new(reader, State::UNAWARE));
        }
        for rs in &mut reader_states {
            rs.sync_current_state();
        }

        match context.get_status_change(Some(POLL_TIMEOUT), &mut reader_states) {
            Ok(()) => {}
            Err(pcsc::Error::Timeout) => continue,
            Err(err) => {
                tracing::error!("status change wait failed: {err}");
                if events
                    .send(ReaderEvent::SourceError {
                        detail: err.to_string(),
                    })
                    .is_err()
                {
                    return;
                }
                thread::sleep(RETRY_DELAY);
                continue;
            }
        }

        for rs in &reader_states {
            let device = rs.name().to_string_lossy().into_owned();
            if device == pcsc::PNP_NOTIFICATION().to_string_lossy() {
                continue;
            }
            let event_state = rs.event_state();
            let previous = card_states.get(&device).cloned();

            if event_state.contains(State::MUTE) {
                // Non-responsive card; report once per transition.
                let is_new = previous
                    .as_ref()
                    .is_none_or(|(prev, _)| !prev.contains(State::MUTE));
                if is_new
                    && events
                        .send(ReaderEvent::DeviceError {
                            device: device.clone(),
                            detail: "card is mute".to_string(),
                        })
                        .is_err()
                {
                    return;
                }
                card_states.insert(device, (event_state, Vec::new()));
            } else if event_state.contains(State::PRESENT) && !event_state.contains(State::EMPTY) {
                let atr = rs.atr().to_vec();
                // A new insertion, or a different card than last time.
                let is_new = previous
                    .is_none_or(|(prev, prev_atr)| !prev.contains(State::PRESENT) || prev_atr != atr);
                if is_new {
                    if events
                        .send(ReaderEvent::CardInserted {
                            card: CardInfo {
                                device: device.clone(),
                                atr: atr.clone(),
                            },
                        })
                        .is_err()
                    {
                        return;
                    }
                    card_states.insert(device, (event_state, atr));
                }
            } else if event_state.contains(State::EMPTY) {
                // Only report removal if we saw the card present.
                let was_present =
                    previous.is_some_and(|(prev, _)| prev.contains(State::PRESENT));
                if was_present {
                    if events
                        .send(ReaderEvent::CardRemoved {
                            device: device.clone(),
                        })
                        .is_err()
                    {
                        return;
                    }
                    card_states.insert(device, (event_state, Vec::new()));
                }
            }
        }

        // Small delay to prevent a tight loop on chatty drivers.
        thread::sleep(Duration::from_millis(10));
    }
}
