pub mod analytics;
pub mod handlers;
mod middleware;
pub mod routes;

pub use routes::create_api_router;
