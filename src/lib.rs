pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod mailer;
pub mod posts;
pub mod state;
pub mod store;
pub mod users;
