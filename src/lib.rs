pub mod api;
pub mod config;
pub mod middleware;
pub mod models;
pub mod services;
