//! Container run configuration carried from layer to layer.
//!
//! Each build step derives the next [`RunConfig`] from the previous one with
//! [`RunConfig::snapshot`]. `RunConfig` owns every list, set and map it holds,
//! so a snapshot never shares storage with its base: a build engine may keep
//! every historical snapshot and derive several candidates from one base in
//! parallel.
//!
//! Serialization uses the Docker/OCI field names (`Cmd`, `Env`,
//! `ExposedPorts`, ...). Sets and maps are ordered, which makes the JSON form
//! and [`RunConfig::digest`] deterministic.

mod modifier;

use std::collections::{BTreeMap, BTreeSet};

use oci_spec::image::ImageConfiguration;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use stevedore_core::error::Result;

pub use modifier::{RunConfigModifier, NOP_MARKER};

/// Runtime configuration of the container a build step runs in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RunConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub hostname: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub domainname: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub user: String,

    /// Exposed ports as `<port>/<proto>`
    #[serde(
        with = "key_set",
        skip_serializing_if = "BTreeSet::is_empty"
    )]
    pub exposed_ports: BTreeSet<String>,

    /// `KEY=value` entries in declaration order
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,

    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub cmd: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<HealthConfig>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub args_escaped: bool,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,

    /// Declared volume mount points
    #[serde(
        with = "key_set",
        skip_serializing_if = "BTreeSet::is_empty"
    )]
    pub volumes: BTreeSet<String>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub working_dir: String,

    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub entrypoint: Vec<String>,

    /// Triggers run when this image is used as a base
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub on_build: Vec<String>,

    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub stop_signal: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_timeout: Option<i32>,

    /// Shell used for shell-form commands; empty means the platform default
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub shell: Vec<String>,
}

/// Container healthcheck. Durations are in nanoseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HealthConfig {
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub test: Vec<String>,

    #[serde(skip_serializing_if = "is_zero")]
    pub interval: i64,

    #[serde(skip_serializing_if = "is_zero")]
    pub timeout: i64,

    #[serde(skip_serializing_if = "is_zero")]
    pub start_period: i64,

    #[serde(skip_serializing_if = "is_zero")]
    pub retries: i64,
}

impl RunConfig {
    /// Derive the next configuration: copy `self`, then apply `modifiers` in
    /// order. `self` is left untouched.
    pub fn snapshot(&self, modifiers: &[RunConfigModifier]) -> RunConfig {
        let mut next = self.clone();
        for modifier in modifiers {
            modifier.apply(&mut next);
        }
        next
    }

    /// Value of `key` in the environment list, if set.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env.iter().find_map(|entry| match entry.split_once('=') {
            Some((k, v)) if k == key => Some(v),
            _ => None,
        })
    }

    /// Content digest (`sha256:<hex>`) of the canonical JSON form.
    pub fn digest(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
    }

    /// First configuration of a build, taken from the base image.
    pub fn from_image_config(image: &ImageConfiguration) -> Self {
        let config = image.config();

        let exposed_ports = config
            .as_ref()
            .and_then(|c| c.exposed_ports().as_ref())
            .map(|ports| ports.iter().cloned().collect())
            .unwrap_or_default();

        let volumes = config
            .as_ref()
            .and_then(|c| c.volumes().as_ref())
            .map(|volumes| volumes.iter().cloned().collect())
            .unwrap_or_default();

        let labels = config
            .as_ref()
            .and_then(|c| c.labels().as_ref())
            .map(|labels| {
                labels
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            user: config
                .as_ref()
                .and_then(|c| c.user().clone())
                .unwrap_or_default(),
            exposed_ports,
            env: config
                .as_ref()
                .and_then(|c| c.env().clone())
                .unwrap_or_default(),
            cmd: config
                .as_ref()
                .and_then(|c| c.cmd().clone())
                .unwrap_or_default(),
            volumes,
            working_dir: config
                .as_ref()
                .and_then(|c| c.working_dir().clone())
                .unwrap_or_default(),
            entrypoint: config
                .as_ref()
                .and_then(|c| c.entrypoint().clone())
                .unwrap_or_default(),
            labels,
            stop_signal: config
                .as_ref()
                .and_then(|c| c.stop_signal().clone())
                .unwrap_or_default(),
            ..Self::default()
        }
    }
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Sets encoded as JSON objects whose values are `{}` (`{"80/tcp": {}}`).
mod key_set {
    use std::collections::{BTreeMap, BTreeSet};

    use serde::de::IgnoredAny;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(serde::Serialize)]
    struct Empty {}

    pub fn serialize<S: Serializer>(set: &BTreeSet<String>, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(set.len()))?;
        for key in set {
            map.serialize_entry(key, &Empty {})?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeSet<String>, D::Error> {
        let map = Option::<BTreeMap<String, IgnoredAny>>::deserialize(deserializer)?;
        Ok(map.map(|m| m.into_keys().collect()).unwrap_or_default())
    }
}
