//! Stevedore Core - Foundational Types
//!
//! Error taxonomy, builder configuration, logging setup, user-namespace ID
//! maps and block-IO throttle parsing shared by the stevedore crates.

pub mod blkio;
pub mod config;
pub mod error;
pub mod idmap;
pub mod log;

// Re-export commonly used types
pub use blkio::{parse_throttle_device, parse_throttle_device_with_size, ThrottleDevice};
pub use config::{BuilderConfig, LogConfig, LogLevel, TargetOs, DEFAULT_DOCKERFILE};
pub use error::{BuildError, Result};
pub use idmap::{IdMap, IdMappings, IdPair};

/// Stevedore version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
