pub mod config;
pub mod config_store;
pub mod credential_store;
pub mod display;
pub mod error;
pub mod notifier;
pub mod storage;
pub mod youtube_client;
