pub mod api;
pub mod chat;
pub mod notice;
pub mod poller;
pub mod session;
