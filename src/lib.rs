pub mod admin;
pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod feedback;
pub mod progress;
pub mod question;
pub mod server;
pub mod user;
pub mod utils;
