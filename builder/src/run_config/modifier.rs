//! Composable run-config modifiers, one per instruction effect.

use std::collections::BTreeMap;

use stevedore_core::config::TargetOs;

use super::{HealthConfig, RunConfig};

/// Marker prefixed to the command of steps that only record metadata.
pub const NOP_MARKER: &str = "#(nop) ";

/// One change to a [`RunConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunConfigModifier {
    /// Replace the command.
    Cmd(Vec<String>),
    /// `Cmd = shell + ["#(nop) ", comment]`.
    CmdComment { comment: String, os: TargetOs },
    /// `Cmd = shell + ["#(nop) <comment>"]`, the single-token form.
    CmdCommentString { comment: String, os: TargetOs },
    /// Replace the environment list.
    Env(Vec<String>),
    /// Set `KEY=value` entries: existing keys are overridden in place, new
    /// keys are appended in the given order.
    MergeEnv(Vec<String>),
    /// Set the entrypoint, but only when `cmd` is non-empty.
    EntrypointOverride {
        cmd: Vec<String>,
        entrypoint: Vec<String>,
    },
    WorkingDir(String),
    User(String),
    /// Merge labels; later values win.
    Labels(BTreeMap<String, String>),
    /// Add exposed ports; a bare port becomes `<port>/tcp`.
    ExposePorts(Vec<String>),
    Volumes(Vec<String>),
    /// Append ONBUILD triggers.
    OnBuild(Vec<String>),
    Shell(Vec<String>),
    Healthcheck(HealthConfig),
    StopSignal(String),
    ArgsEscaped(bool),
}

impl RunConfigModifier {
    pub fn cmd<I, S>(cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Cmd(cmd.into_iter().map(Into::into).collect())
    }

    pub fn cmd_comment(comment: impl Into<String>, os: TargetOs) -> Self {
        Self::CmdComment {
            comment: comment.into(),
            os,
        }
    }

    pub fn cmd_comment_string(comment: impl Into<String>, os: TargetOs) -> Self {
        Self::CmdCommentString {
            comment: comment.into(),
            os,
        }
    }

    pub fn env<I, S>(env: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Env(env.into_iter().map(Into::into).collect())
    }

    pub fn merge_env<I, S>(env: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::MergeEnv(env.into_iter().map(Into::into).collect())
    }

    pub fn entrypoint_override(cmd: Vec<String>, entrypoint: Vec<String>) -> Self {
        Self::EntrypointOverride { cmd, entrypoint }
    }

    /// Apply this change to `config` in place.
    pub fn apply(&self, config: &mut RunConfig) {
        match self {
            Self::Cmd(cmd) => config.cmd = cmd.clone(),
            Self::CmdComment { comment, os } => {
                let mut cmd = shell_for(config, *os);
                cmd.push(NOP_MARKER.to_string());
                cmd.push(comment.clone());
                config.cmd = cmd;
            }
            Self::CmdCommentString { comment, os } => {
                let mut cmd = shell_for(config, *os);
                cmd.push(format!("{}{}", NOP_MARKER, comment));
                config.cmd = cmd;
            }
            Self::Env(env) => config.env = env.clone(),
            Self::MergeEnv(entries) => merge_env(&mut config.env, entries),
            Self::EntrypointOverride { cmd, entrypoint } => {
                if !cmd.is_empty() {
                    config.entrypoint = entrypoint.clone();
                }
            }
            Self::WorkingDir(dir) => config.working_dir = dir.clone(),
            Self::User(user) => config.user = user.clone(),
            Self::Labels(labels) => {
                config
                    .labels
                    .extend(labels.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            Self::ExposePorts(ports) => {
                config
                    .exposed_ports
                    .extend(ports.iter().map(|port| normalize_port(port)));
            }
            Self::Volumes(volumes) => config.volumes.extend(volumes.iter().cloned()),
            Self::OnBuild(triggers) => config.on_build.extend(triggers.iter().cloned()),
            Self::Shell(shell) => config.shell = shell.clone(),
            Self::Healthcheck(health) => config.healthcheck = Some(health.clone()),
            Self::StopSignal(signal) => config.stop_signal = signal.clone(),
            Self::ArgsEscaped(escaped) => config.args_escaped = *escaped,
        }
    }
}

fn shell_for(config: &RunConfig, os: TargetOs) -> Vec<String> {
    if config.shell.is_empty() {
        os.default_shell()
    } else {
        config.shell.clone()
    }
}

fn env_key(entry: &str) -> &str {
    entry.split_once('=').map_or(entry, |(key, _)| key)
}

fn merge_env(env: &mut Vec<String>, entries: &[String]) {
    for entry in entries {
        let key = env_key(entry);
        if let Some(existing) = env.iter_mut().find(|e| env_key(e) == key) {
            *existing = entry.clone();
        } else {
            env.push(entry.clone());
        }
    }
}

fn normalize_port(port: &str) -> String {
    if port.contains('/') {
        port.to_string()
    } else {
        format!("{}/tcp", port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every field populated, so a shallow copy anywhere would show up.
    fn full_mutable_run_config() -> RunConfig {
        RunConfig {
            hostname: "host".to_string(),
            domainname: "example.com".to_string(),
            user: "app".to_string(),
            exposed_ports: ["1000/tcp".to_string(), "1001/tcp".to_string()]
                .into_iter()
                .collect(),
            env: vec!["env1=val1".to_string()],
            cmd: vec!["cmd1".to_string(), "cmd2".to_string()],
            healthcheck: Some(HealthConfig {
                test: vec!["CMD".to_string(), "true".to_string()],
                interval: 1,
                ..HealthConfig::default()
            }),
            args_escaped: true,
            image: "base".to_string(),
            volumes: ["/data".to_string()].into_iter().collect(),
            working_dir: "/work".to_string(),
            entrypoint: vec!["entry1".to_string(), "entry2".to_string()],
            on_build: vec!["RUN true".to_string()],
            labels: [("label1".to_string(), "value1".to_string())]
                .into_iter()
                .collect(),
            stop_signal: "SIGTERM".to_string(),
            stop_timeout: Some(10),
            shell: vec!["sh".to_string(), "-c".to_string()],
        }
    }

    #[test]
    fn test_snapshot_no_modifiers_is_independent_copy() {
        let base = full_mutable_run_config();
        let mut copy = base.snapshot(&[]);
        assert_eq!(copy, base);

        copy.cmd[0] = "changed".to_string();
        copy.env.push("env2=val2".to_string());
        copy.on_build[0] = "start".to_string();
        copy.exposed_ports.insert("1002/tcp".to_string());
        copy.volumes.clear();
        copy.labels.insert("label2".to_string(), "value2".to_string());
        copy.entrypoint.truncate(1);
        copy.shell[0] = "bash".to_string();
        if let Some(health) = copy.healthcheck.as_mut() {
            health.test.push("extra".to_string());
        }

        assert_eq!(base, full_mutable_run_config());
    }

    #[test]
    fn test_snapshot_leaves_base_unmodified() {
        let base = full_mutable_run_config();
        let saved = base.clone();
        let _ = base.snapshot(&[
            RunConfigModifier::cmd(["new"]),
            RunConfigModifier::merge_env(["env1=other", "env3=x"]),
            RunConfigModifier::OnBuild(vec!["RUN false".to_string()]),
            RunConfigModifier::ExposePorts(vec!["2000".to_string()]),
        ]);
        assert_eq!(base, saved);
    }

    #[test]
    fn test_cmd_comment_linux() {
        let base = RunConfig {
            env: vec!["FOO=1".to_string()],
            ..RunConfig::default()
        };
        let next = base.snapshot(&[RunConfigModifier::cmd_comment("hi", TargetOs::Linux)]);
        assert_eq!(next.cmd, vec!["/bin/sh", "-c", "#(nop) ", "hi"]);
        assert_eq!(next.env, base.env);
    }

    #[test]
    fn test_cmd_comment_windows() {
        let next = RunConfig::default()
            .snapshot(&[RunConfigModifier::cmd_comment("hi", TargetOs::Windows)]);
        assert_eq!(next.cmd, vec!["cmd", "/S", "/C", "#(nop) ", "hi"]);
    }

    #[test]
    fn test_cmd_comment_uses_config_shell() {
        let base = RunConfig {
            shell: vec!["powershell".to_string(), "-Command".to_string()],
            ..RunConfig::default()
        };
        let next = base.snapshot(&[RunConfigModifier::cmd_comment("hi", TargetOs::Linux)]);
        assert_eq!(next.cmd, vec!["powershell", "-Command", "#(nop) ", "hi"]);
    }

    #[test]
    fn test_cmd_comment_string() {
        let next = RunConfig::default().snapshot(&[RunConfigModifier::cmd_comment_string(
            "WORKDIR /app",
            TargetOs::Linux,
        )]);
        assert_eq!(next.cmd, vec!["/bin/sh", "-c", "#(nop) WORKDIR /app"]);
    }

    #[test]
    fn test_cmd_and_env() {
        let base = RunConfig {
            cmd: vec!["old".to_string()],
            env: vec!["A=1".to_string()],
            ..RunConfig::default()
        };
        let next = base.snapshot(&[
            RunConfigModifier::cmd(["new"]),
            RunConfigModifier::env(["B=2"]),
        ]);
        assert_eq!(next.cmd, vec!["new"]);
        assert_eq!(next.env, vec!["B=2"]);
    }

    #[test]
    fn test_merge_env_preserves_order() {
        let base = RunConfig {
            env: vec!["A=1".to_string(), "B=2".to_string(), "C=3".to_string()],
            ..RunConfig::default()
        };
        let next = base.snapshot(&[RunConfigModifier::merge_env(["B=20", "D=4", "a=lower"])]);
        assert_eq!(next.env, vec!["A=1", "B=20", "C=3", "D=4", "a=lower"]);
    }

    #[test]
    fn test_entrypoint_override() {
        let base = RunConfig {
            entrypoint: vec!["/old".to_string()],
            ..RunConfig::default()
        };

        let unchanged = base.snapshot(&[RunConfigModifier::entrypoint_override(
            vec![],
            vec!["/new".to_string()],
        )]);
        assert_eq!(unchanged.entrypoint, vec!["/old"]);

        let changed = base.snapshot(&[RunConfigModifier::entrypoint_override(
            vec!["run".to_string()],
            vec![],
        )]);
        assert!(changed.entrypoint.is_empty());
    }

    #[test]
    fn test_modifiers_apply_in_order() {
        let next = RunConfig::default().snapshot(&[
            RunConfigModifier::WorkingDir("/a".to_string()),
            RunConfigModifier::WorkingDir("/b".to_string()),
            RunConfigModifier::OnBuild(vec!["RUN one".to_string()]),
            RunConfigModifier::OnBuild(vec!["RUN two".to_string()]),
        ]);
        assert_eq!(next.working_dir, "/b");
        assert_eq!(next.on_build, vec!["RUN one", "RUN two"]);
    }

    #[test]
    fn test_expose_ports_and_labels() {
        let base = RunConfig {
            labels: [("a".to_string(), "1".to_string())].into_iter().collect(),
            ..RunConfig::default()
        };
        let labels = [
            ("a".to_string(), "2".to_string()),
            ("b".to_string(), "3".to_string()),
        ]
        .into_iter()
        .collect();
        let next = base.snapshot(&[
            RunConfigModifier::ExposePorts(vec!["80".to_string(), "53/udp".to_string()]),
            RunConfigModifier::Labels(labels),
            RunConfigModifier::Volumes(vec!["/data".to_string(), "/data".to_string()]),
        ]);
        assert!(next.exposed_ports.contains("80/tcp"));
        assert!(next.exposed_ports.contains("53/udp"));
        assert_eq!(next.labels["a"], "2");
        assert_eq!(next.labels["b"], "3");
        assert_eq!(next.volumes.len(), 1);
    }

    #[test]
    fn test_scalar_modifiers() {
        let health = HealthConfig {
            test: vec!["NONE".to_string()],
            ..HealthConfig::default()
        };
        let next = RunConfig::default().snapshot(&[
            RunConfigModifier::User("nobody".to_string()),
            RunConfigModifier::Shell(vec!["bash".to_string(), "-c".to_string()]),
            RunConfigModifier::Healthcheck(health.clone()),
            RunConfigModifier::StopSignal("SIGKILL".to_string()),
            RunConfigModifier::ArgsEscaped(true),
        ]);
        assert_eq!(next.user, "nobody");
        assert_eq!(next.shell, vec!["bash", "-c"]);
        assert_eq!(next.healthcheck, Some(health));
        assert_eq!(next.stop_signal, "SIGKILL");
        assert!(next.args_escaped);
    }
}
