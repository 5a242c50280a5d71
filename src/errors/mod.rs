pub mod types;
pub mod classification;

pub use types::ClientError;
pub use classification::ErrorClassification;
