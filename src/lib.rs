pub mod aggregate;
pub mod columns;
pub mod commands;
pub mod config;
pub mod error;
pub mod export;
pub mod forest;
pub mod ingest;
pub mod model;
pub mod predict;
pub mod reply;
pub mod store;
pub mod train;
pub mod webhook;

pub use config::BotConfig;
pub use error::WarDataError;
pub use store::WarStore;
