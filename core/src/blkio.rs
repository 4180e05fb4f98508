//! Block-IO throttle options.
//!
//! Parses `--device-read-bps` style values (`<device>:<rate>`) into
//! [`ThrottleDevice`] entries. Several entries may be given separated by
//! commas. A malformed entry is dropped with a warning rather than reported,
//! so an option where every entry is malformed yields an empty list.

use serde::{Deserialize, Serialize};

/// A device path and its rate limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleDevice {
    pub path: String,
    pub rate: u64,
}

/// Parse entries whose rate is a plain integer (e.g. IOPS limits).
pub fn parse_throttle_device(opt: &str) -> Vec<ThrottleDevice> {
    parse_entries(opt, |rate| {
        rate.trim()
            .parse::<u64>()
            .map_err(|e| format!("invalid rate for device: {rate}: {e}"))
    })
}

/// Parse entries whose rate is a byte size (`20kb`, `1m`, `4096`).
pub fn parse_throttle_device_with_size(opt: &str) -> Vec<ThrottleDevice> {
    parse_entries(opt, parse_size)
}

fn parse_entries(
    opt: &str,
    parse_rate: impl Fn(&str) -> std::result::Result<u64, String>,
) -> Vec<ThrottleDevice> {
    opt.split(',')
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| match parse_entry(entry.trim(), &parse_rate) {
            Ok(device) => Some(device),
            Err(reason) => {
                tracing::warn!(entry, %reason, "Dropping malformed throttle device entry");
                None
            }
        })
        .collect()
}

fn parse_entry(
    entry: &str,
    parse_rate: &impl Fn(&str) -> std::result::Result<u64, String>,
) -> std::result::Result<ThrottleDevice, String> {
    let (path, rate) = match entry.split_once(':') {
        Some((path, rate)) if !rate.contains(':') => (path, rate),
        _ => return Err(format!("bad format: {entry}")),
    };
    if !path.starts_with("/dev/") {
        return Err(format!("bad format for device path: {path}"));
    }
    Ok(ThrottleDevice {
        path: path.to_string(),
        rate: parse_rate(rate)?,
    })
}

/// Parse a human-readable size in binary multiples (`20kb` = 20480).
///
/// Accepts an optional space, a `k`/`m`/`g`/`t`/`p` unit, an optional `i`
/// and an optional trailing `b`, case-insensitively.
pub fn parse_size(s: &str) -> std::result::Result<u64, String> {
    let s = s.trim();
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (num, suffix) = s.split_at(split);
    if num.is_empty() || num.starts_with('.') || num.ends_with('.') {
        return Err(format!("invalid size: '{s}'"));
    }

    let suffix = suffix.strip_prefix(' ').unwrap_or(suffix).to_ascii_lowercase();
    let unit = suffix.strip_suffix('b').unwrap_or(&suffix);
    let unit = unit.strip_suffix('i').unwrap_or(unit);
    let mult: u64 = match unit {
        "" => 1,
        "k" => 1 << 10,
        "m" => 1 << 20,
        "g" => 1 << 30,
        "t" => 1 << 40,
        "p" => 1 << 50,
        _ => return Err(format!("invalid suffix: '{suffix}'")),
    };

    if num.contains('.') {
        let value: f64 = num.parse().map_err(|_| format!("invalid number: {num}"))?;
        Ok((value * mult as f64) as u64)
    } else {
        let value: u64 = num.parse().map_err(|_| format!("invalid number: {num}"))?;
        value
            .checked_mul(mult)
            .ok_or_else(|| format!("size out of range: '{s}'"))
    }
}
