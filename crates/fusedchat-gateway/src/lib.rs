pub mod ai_service;
pub mod assets;
pub mod auth;
pub mod credentials;
pub mod error;
pub mod http;
pub mod users;
