pub mod config;
pub mod error;
pub mod job;
pub mod plan;
pub mod stats;
pub mod store;
pub mod template;
pub mod validate;

pub use error::{Result, WeaverError};
