pub use api_response::*;

pub mod api_response;
pub mod serde_utils;
