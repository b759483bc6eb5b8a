pub mod app;
pub mod auth;
pub mod categories;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod messages;
pub mod orders;
pub mod pagination;
pub mod profiles;
pub mod reviews;
pub mod services;
pub mod state;
