//! HTTP API handlers for the study server

pub mod admin;
pub mod auth;
pub mod buildinfo;
pub mod captures;
pub mod chat;
pub mod health;
pub mod images;
pub mod models;
pub mod moodboard;
pub mod questionnaire;
pub mod ui;

pub use buildinfo::get_build_info;
pub use health::health_routes;
pub use ui::{frontend_service, serve_login};
