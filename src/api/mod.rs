mod handlers;
pub mod middleware;
pub mod response;
mod routes;
pub mod validation;

pub use routes::create_router;
