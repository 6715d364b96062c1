pub mod token;

pub use token::{Identity, TokenError, TokenVerifier};
