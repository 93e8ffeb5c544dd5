pub mod config;
pub mod credential_store;
pub mod dashboard_client;
pub mod error;
pub mod settings_repository;
pub mod storage;
pub mod timer_repository;
