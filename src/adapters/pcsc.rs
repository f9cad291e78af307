//! PC/SC adapters: the reader monitor that turns driver status changes
//! into [`crate::domain::reader::ReaderEvent`]s, and the default card read
//! capability.

mod monitor;
mod read;

pub use monitor::{MonitorError, ReaderMonitor};
pub use read::PcscCardRead;
