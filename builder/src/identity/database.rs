//! passwd/group databases read from the build context.
//!
//! Only the name and numeric ID fields are consulted. Malformed lines are
//! skipped, matching how libc treats them.

use stevedore_core::error::Result;

use crate::context::BuildContext;

pub const PASSWD_PATH: &str = "/etc/passwd";
pub const GROUP_PATH: &str = "/etc/group";

/// `name:password:uid:gid:gecos:home:shell`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswdEntry {
    pub name: String,
    pub uid: u32,
    /// Primary group; `None` when the record has no usable GID field
    pub gid: Option<u32>,
}

/// `name:password:gid:members`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
    pub name: String,
    pub gid: u32,
}

pub fn parse_passwd(content: &str) -> Vec<PasswdEntry> {
    records(content)
        .filter_map(|fields| {
            let uid = fields.get(2)?.parse().ok()?;
            Some(PasswdEntry {
                name: fields[0].to_string(),
                uid,
                gid: fields.get(3).and_then(|gid| gid.parse().ok()),
            })
        })
        .collect()
}

pub fn parse_group(content: &str) -> Vec<GroupEntry> {
    records(content)
        .filter_map(|fields| {
            Some(GroupEntry {
                name: fields[0].to_string(),
                gid: fields.get(2)?.parse().ok()?,
            })
        })
        .collect()
}

fn records(content: &str) -> impl Iterator<Item = Vec<&str>> + '_ {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.split(':').collect::<Vec<_>>())
        .filter(|fields| !fields[0].is_empty())
}

/// Read a database file from the context; a missing file reads as empty.
pub(crate) fn read_database(context: &dyn BuildContext, path: &str) -> Result<String> {
    match context.stat(path)? {
        Some(stat) if !stat.is_dir => {
            let bytes = context.open(path)?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => {
            tracing::debug!(path, "Identity database not present in build context");
            Ok(String::new())
        }
    }
}
