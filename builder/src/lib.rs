//! Stevedore Builder - Build-Step Core
//!
//! The pieces a Dockerfile build engine calls on every step:
//!
//! - [`context`]: locate the Dockerfile and open files inside an untrusted
//!   build context without ever leaving its root
//! - [`identity`]: resolve `--chown` specifiers against the context's own
//!   passwd/group files and the build's user-namespace mapping
//! - [`run_config`]: derive each step's run configuration from the previous
//!   one without sharing state between snapshots
//! - [`session`]: the read-only objects shared by all steps of one build
//!
//! Everything here is synchronous and holds no state across calls.

pub mod context;
pub mod identity;
pub mod run_config;
pub mod session;

// Re-export commonly used types
pub use context::{
    locate_dockerfile, locate_dockerfile_with_default, ArchiveContext, BuildContext, DirContext,
    DockerfileLocation, FileStat,
};
pub use identity::{resolve_chown, ChownSpec, IdSpec};
pub use run_config::{HealthConfig, RunConfig, RunConfigModifier, NOP_MARKER};
pub use session::BuildSession;

pub use stevedore_core::{BuildError, BuilderConfig, IdMap, IdMappings, IdPair, Result, TargetOs};
