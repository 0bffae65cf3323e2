pub mod candidates;
pub mod config;
pub mod cycle;
pub mod detector;
pub mod error;
pub mod gateway;
pub mod pacing;
pub mod publisher;
pub mod supervisor;
pub mod types;

pub use error::{GatewayError, HealerError};
pub use types::*;
