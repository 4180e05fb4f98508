//! Path resolution confined to a context root.
//!
//! The root acts as `/` for the duration of a resolution: absolute symlink
//! targets restart from the root and `..` never climbs above it. Host symlink
//! resolution (`canonicalize`) is never used on context paths.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use stevedore_core::error::{BuildError, Result};

enum Step {
    Up,
    Name(OsString),
}

/// Resolve `unsafe_path` (relative to `root`) following symlinks inside `root`.
///
/// A request that lexically climbs out of the root, such as `../../Dockerfile`,
/// is rejected with [`BuildError::ForbiddenPath`]. Symlinks met along the way
/// are expanded at most `max_links` times in total.
pub fn resolve_in_scope(root: &Path, unsafe_path: &str, max_links: usize) -> Result<PathBuf> {
    let requested = Path::new(unsafe_path);
    if lexically_escapes(requested) {
        return Err(BuildError::ForbiddenPath {
            path: unsafe_path.to_string(),
            resolved: String::new(),
        });
    }

    // `..` in the request itself is applied lexically, before any symlink
    // is expanded; only `..` inside link targets is applied after expansion.
    let mut pending: VecDeque<Step> = lexically_clean(requested)
        .into_iter()
        .map(Step::Name)
        .collect();
    let mut resolved = PathBuf::new();
    let mut links = 0usize;

    while let Some(step) = pending.pop_front() {
        let name = match step {
            Step::Up => {
                resolved.pop();
                continue;
            }
            Step::Name(name) => name,
        };

        let candidate = resolved.join(&name);
        let full = root.join(&candidate);

        // Missing (or unreadable) components are taken literally; the
        // caller's stat/open reports the real condition.
        let is_symlink = std::fs::symlink_metadata(&full)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        if !is_symlink {
            resolved = candidate;
            continue;
        }

        links += 1;
        if links > max_links {
            return Err(BuildError::TooManyLinks {
                path: unsafe_path.to_string(),
            });
        }

        let target = std::fs::read_link(&full)?;
        tracing::trace!(
            link = %candidate.display(),
            target = %target.display(),
            "Following symlink inside build context"
        );
        if target.has_root() {
            resolved = PathBuf::new();
        }
        let expansion: Vec<Step> = steps(&target).collect();
        for step in expansion.into_iter().rev() {
            pending.push_front(step);
        }
    }

    Ok(root.join(resolved))
}

/// Whether cleaning `path` as if joined under a root would leave the root.
/// An absolute path cannot: `/..` is `/`.
fn lexically_escapes(path: &Path) -> bool {
    if path.has_root() {
        return false;
    }
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if depth == 0 {
                    return true;
                }
                depth -= 1;
            }
            Component::Normal(_) => depth += 1,
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
        }
    }
    false
}

fn lexically_clean(path: &Path) -> Vec<OsString> {
    let mut names = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                names.pop();
            }
            Component::Normal(name) => names.push(name.to_os_string()),
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
        }
    }
    names
}

fn steps(path: &Path) -> impl Iterator<Item = Step> + '_ {
    path.components().filter_map(|component| match component {
        Component::ParentDir => Some(Step::Up),
        Component::Normal(name) => Some(Step::Name(name.to_os_string())),
        Component::Prefix(_) | Component::RootDir | Component::CurDir => None,
    })
}
