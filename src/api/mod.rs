// API routes and handlers

pub mod errors;
pub mod health;
pub mod routes;
pub mod state;
pub mod subscription;

pub use errors::ApiError;
pub use routes::create_routes;
pub use state::AppState;
