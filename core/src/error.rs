use thiserror::Error;

/// Stevedore build error types
#[derive(Error, Debug)]
pub enum BuildError {
    /// The located Dockerfile has no content
    #[error("the Dockerfile ({name}) cannot be empty")]
    EmptyDockerfile { name: String },

    /// A requested path lies outside the build context root
    #[error("Forbidden path outside the build context: {path} ({resolved})")]
    ForbiddenPath { path: String, resolved: String },

    /// The Dockerfile does not exist inside the build context
    #[error("Cannot locate specified Dockerfile: {name}")]
    DockerfileNotFound { name: String },

    /// Symlink expansion exceeded the configured bound
    #[error("too many links in {path}")]
    TooManyLinks { path: String },

    /// Malformed `--chown` specifier
    #[error("invalid chown string format: {0}")]
    InvalidChownFormat(String),

    /// User name missing from the context's passwd database
    #[error("can't find uid for user {0}: no such user: {0}")]
    NoSuchUser(String),

    /// Group name missing from the context's group database
    #[error("can't find gid for group {0}: no such group: {0}")]
    NoSuchGroup(String),

    /// Container-side ID outside every range of a non-empty ID map
    #[error("Container ID {id} cannot be mapped to a host ID")]
    UnmappedId { id: u32 },

    /// Build context could not be prepared or read
    #[error("Build context error: {0}")]
    ContextError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl BuildError {
    /// Whether the error stems from user-supplied input (the Dockerfile path or
    /// a chown specifier). These end the current step and are never retried.
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            BuildError::EmptyDockerfile { .. }
                | BuildError::ForbiddenPath { .. }
                | BuildError::DockerfileNotFound { .. }
                | BuildError::TooManyLinks { .. }
                | BuildError::InvalidChownFormat(_)
                | BuildError::NoSuchUser(_)
                | BuildError::NoSuchGroup(_)
                | BuildError::UnmappedId { .. }
        )
    }
}

impl From<serde_json::Error> for BuildError {
    fn from(err: serde_json::Error) -> Self {
        BuildError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for BuildError {
    fn from(err: serde_yaml::Error) -> Self {
        BuildError::SerializationError(err.to_string())
    }
}

/// Result type alias for stevedore operations
pub type Result<T> = std::result::Result<T, BuildError>;
