pub mod bootstrap;
pub mod commands;
pub mod edit_queue;
pub mod mirror_sync;
