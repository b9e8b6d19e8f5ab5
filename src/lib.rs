pub mod chdb;
pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod pubsub;
pub mod recorder;
pub mod tagrecorder;

pub use error::{RessyncError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
