//! User-namespace ID mapping tables.
//!
//! An [`IdMap`] maps a contiguous range of container-side IDs onto a range of
//! host-side IDs, in the same shape as `/proc/<pid>/uid_map`. [`IdMappings`]
//! pairs a UID table with a GID table. An empty table is the identity.

use serde::{Deserialize, Serialize};

use crate::error::{BuildError, Result};

/// One range of a user-namespace map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdMap {
    /// First container-side ID of the range
    pub container_id: u32,
    /// First host-side ID of the range
    pub host_id: u32,
    /// Number of IDs in the range
    pub size: u32,
}

impl IdMap {
    pub fn new(container_id: u32, host_id: u32, size: u32) -> Self {
        Self {
            container_id,
            host_id,
            size,
        }
    }

    /// Parse `uid_map`-style text: one `<container> <host> <size>` triple per line.
    pub fn parse_table(content: &str) -> Result<Vec<IdMap>> {
        let mut maps = Vec::new();
        for (line_num, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            if fields.len() != 3 {
                return Err(BuildError::ConfigError(format!(
                    "Line {}: expected '<container> <host> <size>', got '{}'",
                    line_num + 1,
                    trimmed
                )));
            }

            let parse = |field: &str| {
                field.parse::<u32>().map_err(|e| {
                    BuildError::ConfigError(format!(
                        "Line {}: invalid id '{}': {}",
                        line_num + 1,
                        field,
                        e
                    ))
                })
            };
            let map = IdMap::new(parse(fields[0])?, parse(fields[1])?, parse(fields[2])?);
            map.validate()?;
            maps.push(map);
        }
        Ok(maps)
    }

    /// Both ends of the range must fit in the 32-bit ID space.
    pub fn validate(&self) -> Result<()> {
        let limit = u64::from(u32::MAX) + 1;
        if u64::from(self.container_id) + u64::from(self.size) > limit
            || u64::from(self.host_id) + u64::from(self.size) > limit
        {
            return Err(BuildError::ConfigError(format!(
                "ID range {}:{}:{} overflows the 32-bit ID space",
                self.container_id, self.host_id, self.size
            )));
        }
        Ok(())
    }

    fn container_to_host(&self, id: u32) -> Option<u32> {
        let offset = id.checked_sub(self.container_id)?;
        if offset < self.size {
            self.host_id.checked_add(offset)
        } else {
            None
        }
    }

    fn host_to_container(&self, id: u32) -> Option<u32> {
        let offset = id.checked_sub(self.host_id)?;
        if offset < self.size {
            self.container_id.checked_add(offset)
        } else {
            None
        }
    }
}

/// A concrete UID/GID pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct IdPair {
    pub uid: u32,
    pub gid: u32,
}

impl IdPair {
    pub fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }
}

/// UID and GID maps in effect for one build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdMappings {
    #[serde(default)]
    uids: Vec<IdMap>,
    #[serde(default)]
    gids: Vec<IdMap>,
}

impl IdMappings {
    /// Mappings that translate nothing.
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn from_maps(uids: Vec<IdMap>, gids: Vec<IdMap>) -> Self {
        Self { uids, gids }
    }

    pub fn uids(&self) -> &[IdMap] {
        &self.uids
    }

    pub fn gids(&self) -> &[IdMap] {
        &self.gids
    }

    /// True when neither table has any range.
    pub fn is_empty(&self) -> bool {
        self.uids.is_empty() && self.gids.is_empty()
    }

    /// Translate a container-side pair to the host side.
    pub fn to_host(&self, pair: IdPair) -> Result<IdPair> {
        Ok(IdPair {
            uid: translate(pair.uid, &self.uids, IdMap::container_to_host)?,
            gid: translate(pair.gid, &self.gids, IdMap::container_to_host)?,
        })
    }

    /// Translate a host-side pair back into the container.
    pub fn to_container(&self, pair: IdPair) -> Result<IdPair> {
        Ok(IdPair {
            uid: translate(pair.uid, &self.uids, IdMap::host_to_container)?,
            gid: translate(pair.gid, &self.gids, IdMap::host_to_container)?,
        })
    }

    /// Host-side owner of container root.
    pub fn root_pair(&self) -> Result<IdPair> {
        self.to_host(IdPair::new(0, 0))
    }
}

fn translate(id: u32, maps: &[IdMap], lookup: fn(&IdMap, u32) -> Option<u32>) -> Result<u32> {
    if maps.is_empty() {
        return Ok(id);
    }
    maps.iter()
        .find_map(|m| lookup(m, id))
        .ok_or(BuildError::UnmappedId { id })
}
