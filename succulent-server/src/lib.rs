pub mod error;
pub mod http;
pub mod subsystems;

pub use error::ApiError;
