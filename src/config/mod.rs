// Application configuration

pub mod app;

pub use app::*;
