//! Offline Step Functions
//!
//! Run AWS Step Functions state machines against a local emulator during
//! development.
//!
//! This library provides functionality for:
//! - Loading state machine definitions from a service manifest
//! - Rewriting Task resources into the Lambda ARNs of the deployed functions
//! - Starting, health-checking and stopping a local Step Functions emulator
//! - Registering definitions with it and publishing the resulting ARNs

pub mod cli;
pub mod config;
pub mod definition;
pub mod emulator;
pub mod error;
pub mod manifest;
pub mod session;

pub use config::Config;
pub use error::{Error, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize logging with the given log level
///
/// Logs go to stderr so stdout stays parseable.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "offline-step-functions");
    }
}
