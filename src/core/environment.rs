// src/core/environment.rs

use std::collections::BTreeMap;
use std::ffi::OsString;

/// The complete environment handed to a child process.
pub type EnvMap = BTreeMap<OsString, OsString>;

/// Snapshot of the calling process's environment.
/// Non UTF-8 variables are kept as they are.
pub fn inherited() -> EnvMap {
    std::env::vars_os().collect()
}

/// Returns `base` with every entry of `overrides` inserted on top of it.
///
/// Pure: neither `base` nor the process environment is touched.
pub fn merge_env<I, K, V>(base: I, overrides: &BTreeMap<String, String>) -> EnvMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<OsString>,
    V: Into<OsString>,
{
    let mut merged: EnvMap = base
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();
    for (key, value) in overrides {
        merged.insert(OsString::from(key), OsString::from(value));
    }
    merged
}

/// Merges `overrides` over the current process environment.
pub fn child_env(overrides: &BTreeMap<String, String>) -> EnvMap {
    merge_env(inherited(), overrides)
}

/// Parses a `KEY=VALUE` assignment. The value may itself contain `=`.
pub fn parse_assignment(assignment: &str) -> Option<(String, String)> {
    let (key, value) = assignment.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}
