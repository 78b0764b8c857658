pub mod config;
pub mod data_storage;
pub mod formatter;
pub mod logger;
pub mod messages;
pub mod mood;
pub mod state;
pub mod stats;
pub mod view;
