pub mod auth;
pub mod credentials;
pub mod error;
pub mod http;
pub mod orchestrator;
