//! Build context access and Dockerfile location.
//!
//! A build context is a rooted file tree supplied by the (possibly untrusted)
//! caller. Every lookup goes through [`scope::resolve_in_scope`], so neither a
//! `..` request nor a planted symlink can reach files outside the root.
//!
//! Two backings are provided: [`DirContext`] for a directory on disk and
//! [`ArchiveContext`] for a tar stream unpacked into a private directory.

mod archive;
pub mod scope;

use std::path::{Path, PathBuf};

use stevedore_core::config::{DEFAULT_DOCKERFILE, DEFAULT_MAX_SYMLINKS};
use stevedore_core::error::{BuildError, Result};

pub use archive::ArchiveContext;

/// Metadata of an existing context entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub is_dir: bool,
    pub size: u64,
}

/// Read-only view of a build context.
///
/// All paths are relative to the context root; absolute paths are taken as
/// relative to the root as well.
pub trait BuildContext: Send + Sync {
    /// Root directory backing the context.
    fn root(&self) -> &Path;

    /// Bound on symlink expansions per resolution.
    fn max_symlinks(&self) -> usize {
        DEFAULT_MAX_SYMLINKS
    }

    /// Resolve a context path to a host path inside [`root`](Self::root).
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        scope::resolve_in_scope(self.root(), path, self.max_symlinks())
    }

    /// `Ok(None)` when nothing exists at `path`.
    fn stat(&self, path: &str) -> Result<Option<FileStat>> {
        let full = self.resolve(path)?;
        match std::fs::metadata(&full) {
            Ok(metadata) => Ok(Some(FileStat {
                is_dir: metadata.is_dir(),
                size: metadata.len(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read a whole file.
    fn open(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path)?;
        Ok(std::fs::read(full)?)
    }
}

/// A build context backed by a directory on the host.
#[derive(Debug, Clone)]
pub struct DirContext {
    root: PathBuf,
    max_symlinks: usize,
}

impl DirContext {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        Self::with_max_symlinks(root, DEFAULT_MAX_SYMLINKS)
    }

    pub fn with_max_symlinks(root: impl AsRef<Path>, max_symlinks: usize) -> Result<Self> {
        let root = root.as_ref();
        // The root itself is trusted; canonicalize it once so containment
        // holds when it sits behind a host symlink (e.g. /var on macOS).
        let root = root.canonicalize().map_err(|e| {
            BuildError::ContextError(format!(
                "Invalid build context path '{}': {}",
                root.display(),
                e
            ))
        })?;
        if !root.is_dir() {
            return Err(BuildError::ContextError(format!(
                "Build context '{}' is not a directory",
                root.display()
            )));
        }
        Ok(Self { root, max_symlinks })
    }
}

impl BuildContext for DirContext {
    fn root(&self) -> &Path {
        &self.root
    }

    fn max_symlinks(&self) -> usize {
        self.max_symlinks
    }
}

/// A Dockerfile found inside a build context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerfileLocation {
    name: String,
    resolved: PathBuf,
    size: u64,
}

impl DockerfileLocation {
    /// Context-relative name the file was found under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host path after in-scope symlink resolution.
    pub fn resolved(&self) -> &Path {
        &self.resolved
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read the Dockerfile text through `context`.
    pub fn read(&self, context: &dyn BuildContext) -> Result<String> {
        let content = context.open(&self.name)?;
        if content.is_empty() {
            return Err(BuildError::EmptyDockerfile {
                name: self.name.clone(),
            });
        }
        String::from_utf8(content).map_err(|e| {
            BuildError::ContextError(format!("Dockerfile {} is not valid UTF-8: {}", self.name, e))
        })
    }
}

/// Locate the Dockerfile, falling back to `Dockerfile` when `requested` is empty.
pub fn locate_dockerfile(context: &dyn BuildContext, requested: &str) -> Result<DockerfileLocation> {
    locate_dockerfile_with_default(context, requested, DEFAULT_DOCKERFILE)
}

/// Locate the Dockerfile using `default_name` when `requested` is empty.
///
/// When the default name itself is missing, its lowercase spelling is tried
/// before giving up.
pub fn locate_dockerfile_with_default(
    context: &dyn BuildContext,
    requested: &str,
    default_name: &str,
) -> Result<DockerfileLocation> {
    let name = if requested.is_empty() {
        default_name
    } else {
        requested
    };

    if let Some(location) = find_file(context, name)? {
        return check_not_empty(location);
    }

    if name == default_name {
        let lowercase = name.to_lowercase();
        if lowercase != name {
            if let Some(location) = find_file(context, &lowercase)? {
                tracing::debug!(name = %lowercase, "Using lowercase Dockerfile name");
                return check_not_empty(location);
            }
        }
    }

    Err(BuildError::DockerfileNotFound {
        name: name.to_string(),
    })
}

fn find_file(context: &dyn BuildContext, name: &str) -> Result<Option<DockerfileLocation>> {
    let resolved = context.resolve(name)?;
    let location = match context.stat(name)? {
        Some(stat) if !stat.is_dir => Some(DockerfileLocation {
            name: name.to_string(),
            resolved,
            size: stat.size,
        }),
        _ => None,
    };
    Ok(location)
}

fn check_not_empty(location: DockerfileLocation) -> Result<DockerfileLocation> {
    if location.size == 0 {
        return Err(BuildError::EmptyDockerfile {
            name: location.name,
        });
    }
    tracing::debug!(
        name = %location.name,
        path = %location.resolved.display(),
        size = location.size,
        "Located Dockerfile"
    );
    Ok(location)
}
