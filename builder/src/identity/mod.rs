//! `--chown` ownership resolution.
//!
//! A specifier is `user[:group]`, each part numeric or a name. Names are looked
//! up in the passwd/group files of the *build context*, never the builder
//! host, and the result is translated through the user-namespace mapping of
//! the build.
//!
//! ```text
//! "1"          -> uid 1,  gid 1
//! "bin:5555"   -> uid of bin, gid 5555
//! "unicorn"    -> uid of unicorn, primary gid of unicorn
//! ```

pub mod database;

use std::str::FromStr;

use stevedore_core::error::{BuildError, Result};
use stevedore_core::idmap::{IdMappings, IdPair};

use crate::context::BuildContext;
use database::{parse_group, parse_passwd, read_database, GROUP_PATH, PASSWD_PATH};

/// One side of a chown specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdSpec {
    Numeric(u32),
    Name(String),
}

impl IdSpec {
    fn parse(part: &str) -> Self {
        match part.parse::<u32>() {
            Ok(id) => IdSpec::Numeric(id),
            Err(_) => IdSpec::Name(part.to_string()),
        }
    }
}

/// A parsed `user[:group]` specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChownSpec {
    pub user: IdSpec,
    pub group: Option<IdSpec>,
}

impl ChownSpec {
    pub fn parse(spec: &str) -> Result<Self> {
        let mut parts = spec.split(':');
        let user = parts.next().unwrap_or_default();
        let group = parts.next();
        if parts.next().is_some() {
            return Err(BuildError::InvalidChownFormat(spec.to_string()));
        }

        Ok(Self {
            user: IdSpec::parse(user),
            group: group.map(IdSpec::parse),
        })
    }

    /// Resolve to container-side IDs using the databases in `context`.
    ///
    /// Without a group part, a numeric user keeps its UID as GID and a named
    /// user takes its primary GID (or its UID when the record has none).
    pub fn resolve(&self, context: &dyn BuildContext) -> Result<IdPair> {
        let (uid, primary_gid) = match &self.user {
            IdSpec::Numeric(uid) => (*uid, None),
            IdSpec::Name(name) => {
                let passwd = read_database(context, PASSWD_PATH)?;
                let entry = parse_passwd(&passwd)
                    .into_iter()
                    .find(|entry| &entry.name == name)
                    .ok_or_else(|| BuildError::NoSuchUser(name.clone()))?;
                (entry.uid, entry.gid)
            }
        };

        let gid = match &self.group {
            Some(IdSpec::Numeric(gid)) => *gid,
            Some(IdSpec::Name(name)) => {
                let group = read_database(context, GROUP_PATH)?;
                parse_group(&group)
                    .into_iter()
                    .find(|entry| &entry.name == name)
                    .map(|entry| entry.gid)
                    .ok_or_else(|| BuildError::NoSuchGroup(name.clone()))?
            }
            None => primary_gid.unwrap_or(uid),
        };

        Ok(IdPair::new(uid, gid))
    }
}

impl FromStr for ChownSpec {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Resolve a `--chown` specifier to host-side IDs.
pub fn resolve_chown(
    spec: &str,
    context: &dyn BuildContext,
    mappings: &IdMappings,
) -> Result<IdPair> {
    let container = ChownSpec::parse(spec)?.resolve(context)?;
    let host = mappings.to_host(container)?;
    tracing::debug!(
        spec,
        uid = host.uid,
        gid = host.gid,
        remapped = !mappings.is_empty(),
        "Resolved chown identity"
    );
    Ok(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric() {
        let spec = ChownSpec::parse("0:1").unwrap();
        assert_eq!(spec.user, IdSpec::Numeric(0));
        assert_eq!(spec.group, Some(IdSpec::Numeric(1)));
    }

    #[test]
    fn test_parse_names() {
        let spec: ChownSpec = "bin:staff".parse().unwrap();
        assert_eq!(spec.user, IdSpec::Name("bin".to_string()));
        assert_eq!(spec.group, Some(IdSpec::Name("staff".to_string())));
    }

    #[test]
    fn test_parse_user_only() {
        let spec = ChownSpec::parse("1").unwrap();
        assert_eq!(spec.user, IdSpec::Numeric(1));
        assert_eq!(spec.group, None);
    }

    #[test]
    fn test_parse_negative_is_name() {
        let spec = ChownSpec::parse("-1").unwrap();
        assert_eq!(spec.user, IdSpec::Name("-1".to_string()));
    }

    #[test]
    fn test_parse_too_many_colons() {
        let err = ChownSpec::parse("bob:1:555").unwrap_err();
        assert_eq!(err.to_string(), "invalid chown string format: bob:1:555");
    }
}
