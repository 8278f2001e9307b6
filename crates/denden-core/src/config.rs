use std::time::Duration;

use crate::envelope::AmbientIds;

pub const DEFAULT_ADDR: &str = "127.0.0.1:9700";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_ADDR: &str = "DENDEN_ADDR";
pub const ENV_TIMEOUT: &str = "DENDEN_TIMEOUT";
pub const ENV_AGENT_ID: &str = "DENDEN_AGENT_ID";
pub const ENV_PARENT_AGENT_ID: &str = "DENDEN_PARENT_AGENT_ID";
pub const ENV_WORKTREE_ID: &str = "DENDEN_WORKTREE_ID";

/// Raw, unvalidated configuration values as read from flags or environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigInputs {
    pub addr: Option<String>,
    pub timeout: Option<String>,
    pub agent_id: Option<String>,
    pub parent_agent_id: Option<String>,
    pub worktree_id: Option<String>,
}

impl ConfigInputs {
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            addr: lookup(ENV_ADDR),
            timeout: lookup(ENV_TIMEOUT),
            agent_id: lookup(ENV_AGENT_ID),
            parent_agent_id: lookup(ENV_PARENT_AGENT_ID),
            worktree_id: lookup(ENV_WORKTREE_ID),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub addr: String,
    pub timeout: Duration,
    /// Timeout override that could not be parsed and was replaced by the default.
    pub ignored_timeout: Option<String>,
    pub ambient: AmbientIds,
}

pub fn resolve_config(inputs: ConfigInputs) -> ClientConfig {
    let addr = non_empty(inputs.addr)
        .map(|a| a.trim().to_owned())
        .unwrap_or_else(|| DEFAULT_ADDR.to_owned());

    let (timeout, ignored_timeout) = match non_empty(inputs.timeout) {
        None => (DEFAULT_TIMEOUT, None),
        Some(raw) => match parse_duration(raw.trim()) {
            Some(d) => (d, None),
            None => (DEFAULT_TIMEOUT, Some(raw)),
        },
    };

    ClientConfig {
        addr,
        timeout,
        ignored_timeout,
        ambient: AmbientIds {
            agent_id: non_empty(inputs.agent_id),
            parent_agent_id: non_empty(inputs.parent_agent_id),
            worktree_id: non_empty(inputs.worktree_id),
        },
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

/// Parses a duration such as `"30s"`, `"1m30s"`, `"250ms"` or `"1.5h"`.
///
/// Accepts a sequence of decimal numbers, each with a unit suffix (`ns`, `us`,
/// `µs`, `ms`, `s`, `m`, `h`). A bare `"0"` is also accepted. Negative values
/// are rejected.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let s = input.strip_prefix('+').unwrap_or(input);
    if s == "0" {
        return Some(Duration::ZERO);
    }
    if s.is_empty() {
        return None;
    }

    let mut rest = s;
    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_len = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let (int_digits, after) = rest.split_at(int_len);

        let (frac_digits, after) = match after.strip_prefix('.') {
            Some(tail) => {
                let n = tail
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(tail.len());
                tail.split_at(n)
            }
            None => ("", after),
        };
        if int_digits.is_empty() && frac_digits.is_empty() {
            return None;
        }

        let unit_len = after
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after.len());
        let (unit, tail) = after.split_at(unit_len);
        let scale = unit_nanos(unit)?;

        let whole: u128 = if int_digits.is_empty() {
            0
        } else {
            int_digits.parse().ok()?
        };
        total = total.checked_add(whole.checked_mul(scale)?)?;

        if !frac_digits.is_empty() {
            let digits = &frac_digits[..frac_digits.len().min(18)];
            let frac: u128 = digits.parse().ok()?;
            let denom = 10u128.pow(digits.len() as u32);
            total = total.checked_add(frac * scale / denom)?;
        }

        rest = tail;
    }

    u64::try_from(total).ok().map(Duration::from_nanos)
}

fn unit_nanos(unit: &str) -> Option<u128> {
    let nanos = match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        "h" => 3_600 * 1_000_000_000,
        _ => return None,
    };
    Some(nanos)
}
