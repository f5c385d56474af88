pub mod config;
pub mod files;
pub mod message;
pub mod platform;
pub mod protocol;
pub mod task;
