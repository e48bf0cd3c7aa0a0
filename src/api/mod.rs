//! Request routing and response shaping for the objects endpoints.

pub mod error;
pub mod handlers;
pub mod params;
pub mod request;
pub mod response;
pub mod route;

pub use error::ApiError;
pub use handlers::App;
pub use request::{ApiRequest, ApiResponse, Method};
