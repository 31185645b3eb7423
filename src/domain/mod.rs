pub mod error;
pub mod models;
pub mod signature;
pub mod tokens;

pub use error::DomainError;
pub use models::*;
pub use signature::compute_signature;
pub use tokens::approx_token_count;
