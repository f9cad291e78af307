pub mod messages;
pub mod query;
pub mod reader;
pub mod relay;
