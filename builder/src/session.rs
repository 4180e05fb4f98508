//! Per-build state shared by every step.

use std::io::Read;
use std::path::Path;

use stevedore_core::config::BuilderConfig;
use stevedore_core::error::Result;
use stevedore_core::idmap::{IdMappings, IdPair};

use crate::context::{
    locate_dockerfile_with_default, ArchiveContext, BuildContext, DirContext, DockerfileLocation,
};
use crate::identity::resolve_chown;
use crate::run_config::RunConfigModifier;

/// The read-only objects of one build: its context, configuration and ID
/// mappings. Steps may run against one session concurrently.
#[derive(Debug)]
pub struct BuildSession<C: BuildContext> {
    context: C,
    config: BuilderConfig,
    mappings: IdMappings,
}

impl<C: BuildContext> BuildSession<C> {
    pub fn new(context: C, config: BuilderConfig) -> Result<Self> {
        config.validate()?;
        let mappings = config.id_mappings();
        tracing::info!(
            root = %context.root().display(),
            target_os = %config.target_os,
            remapped = !mappings.is_empty(),
            "Build session ready"
        );
        Ok(Self {
            context,
            config,
            mappings,
        })
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn mappings(&self) -> &IdMappings {
        &self.mappings
    }

    /// Locate the build file; an empty `requested` means the configured name.
    pub fn locate_dockerfile(&self, requested: &str) -> Result<DockerfileLocation> {
        locate_dockerfile_with_default(&self.context, requested, &self.config.dockerfile)
    }

    /// Locate and read the build file.
    pub fn read_dockerfile(&self, requested: &str) -> Result<String> {
        self.locate_dockerfile(requested)?.read(&self.context)
    }

    /// Host-side owner for a `--chown` specifier.
    pub fn resolve_chown(&self, spec: &str) -> Result<IdPair> {
        resolve_chown(spec, &self.context, &self.mappings)
    }

    /// Host-side owner for files created without `--chown`.
    pub fn root_pair(&self) -> Result<IdPair> {
        self.mappings.root_pair()
    }

    /// Comment modifier for the target platform.
    pub fn comment(&self, comment: impl Into<String>) -> RunConfigModifier {
        RunConfigModifier::cmd_comment(comment, self.config.target_os)
    }

    /// Single-token comment modifier for the target platform.
    pub fn comment_string(&self, comment: impl Into<String>) -> RunConfigModifier {
        RunConfigModifier::cmd_comment_string(comment, self.config.target_os)
    }
}

impl BuildSession<DirContext> {
    /// Session over a context directory on the host.
    pub fn open_dir(root: impl AsRef<Path>, config: BuilderConfig) -> Result<Self> {
        let context = DirContext::with_max_symlinks(root, config.max_symlinks)?;
        Self::new(context, config)
    }
}

impl BuildSession<ArchiveContext> {
    /// Session over a (possibly compressed) tar stream.
    pub fn open_archive<R: Read>(reader: R, config: BuilderConfig) -> Result<Self> {
        let context = ArchiveContext::from_reader_with_max_symlinks(reader, config.max_symlinks)?;
        Self::new(context, config)
    }
}
