//! HTTP API handlers for ayur-api

pub mod chat;
pub mod form;
pub mod health;
pub mod identify;

pub use chat::chat_routes;
pub use health::health_routes;
pub use identify::identify_routes;
