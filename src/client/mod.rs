pub mod endpoints;
pub mod executor;

pub use executor::{error_message, ApiClient, ApiResponse};
pub use reqwest::Method;
