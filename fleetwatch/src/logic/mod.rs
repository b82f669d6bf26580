pub mod client;
pub mod config;
pub mod poll;
pub mod sleep;
pub mod status;
pub mod types;
