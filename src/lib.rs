pub mod cache;
pub mod categories;
pub mod config;
pub mod error;
pub mod logging;
pub mod query;
pub mod repository;
pub mod server;
pub mod storage;
pub mod time;

// Event value objects shared across layers
pub mod domain;
