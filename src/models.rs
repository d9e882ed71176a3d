// src/models.rs

use crate::core::settings::Settings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::path::PathBuf;
use std::time::Duration;

// --- COMMAND MODELS ---

/// One stage's resolved command line: the program followed by its arguments.
///
/// Produced by the tokenizer (or handed in pre-built by the caller) and never
/// modified afterwards.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct ArgumentVector(Vec<String>);

impl ArgumentVector {
    /// Wraps an already split list of words.
    pub fn new(words: Vec<String>) -> Self {
        Self(words)
    }

    /// The executable name, if the vector is not empty.
    pub fn program(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Everything after the program name.
    pub fn args(&self) -> &[String] {
        self.0.get(1..).unwrap_or(&[])
    }

    /// Consumes the vector, returning the raw words.
    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

impl Deref for ArgumentVector {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<String>> for ArgumentVector {
    fn from(words: Vec<String>) -> Self {
        Self(words)
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for ArgumentVector {
    fn from(words: [S; N]) -> Self {
        Self(words.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>> FromIterator<S> for ArgumentVector {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for ArgumentVector {
    /// Renders the vector as a shell-quoted line that tokenizes back to the same words.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match shlex::try_join(self.0.iter().map(String::as_str)) {
            Ok(line) => f.write_str(&line),
            // Words containing NUL bytes cannot be quoted; fall back to a plain join.
            Err(_) => f.write_str(&self.0.join(" ")),
        }
    }
}

/// A command as submitted by a caller.
///
/// Raw strings go through the tokenizer; pre-built stages are used as they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// A shell-like string, possibly containing `|` separators.
    Raw(String),
    /// Already tokenized stages.
    Stages(Vec<ArgumentVector>),
}

impl From<&str> for CommandLine {
    fn from(line: &str) -> Self {
        Self::Raw(line.to_string())
    }
}

impl From<String> for CommandLine {
    fn from(line: String) -> Self {
        Self::Raw(line)
    }
}

impl From<&String> for CommandLine {
    fn from(line: &String) -> Self {
        Self::Raw(line.clone())
    }
}

impl From<ArgumentVector> for CommandLine {
    fn from(stage: ArgumentVector) -> Self {
        Self::Stages(vec![stage])
    }
}

impl From<Vec<ArgumentVector>> for CommandLine {
    fn from(stages: Vec<ArgumentVector>) -> Self {
        Self::Stages(stages)
    }
}

// --- EXECUTION OPTIONS ---

/// Per-invocation configuration for a blocking pipeline run.
///
/// Built once by the caller and only read during execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Bytes written to the first stage's stdin. `None` closes stdin immediately.
    pub input: Option<Vec<u8>>,
    /// How long each stage may run before the termination escalation starts.
    pub timeout: Option<Duration>,
    /// Grace period between the terminate and kill signals. `None` means no grace.
    pub kill_timeout: Option<Duration>,
    /// Variables added to (or overriding) the inherited environment.
    pub env: BTreeMap<String, String>,
    /// Working directory for every stage. Defaults to the caller's.
    pub cwd: Option<PathBuf>,
    /// Maximum bytes kept per captured stream and stage. `None` keeps everything.
    pub capture_limit: Option<usize>,
}

impl RunOptions {
    /// Empty options: no input, no timeout, inherited environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the options from the user's configuration file.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            input: None,
            timeout: settings.timeout,
            kill_timeout: settings.kill_timeout,
            env: settings.env.clone(),
            cwd: settings.cwd.clone(),
            capture_limit: settings.capture_limit,
        }
    }

    /// Sets the bytes fed to the first stage.
    pub fn input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Sets the per-stage timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the grace period between terminate and kill.
    pub fn kill_timeout(mut self, kill_timeout: Duration) -> Self {
        self.kill_timeout = Some(kill_timeout);
        self
    }

    /// Adds one environment override.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Adds several environment overrides.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Sets the working directory.
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Bounds how much of each stream is kept.
    pub fn capture_limit(mut self, limit: usize) -> Self {
        self.capture_limit = Some(limit);
        self
    }
}

/// Per-invocation configuration for an interactive connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Bytes written to stdin right after the process starts. Stdin stays open.
    pub input: Option<Vec<u8>>,
    /// Variables added to (or overriding) the inherited environment.
    pub env: BTreeMap<String, String>,
    /// Working directory of the process.
    pub cwd: Option<PathBuf>,
}

impl ConnectOptions {
    /// Empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the options from the user's configuration file.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            input: None,
            env: settings.env.clone(),
            cwd: settings.cwd.clone(),
        }
    }

    /// Sets the bytes written at connect time.
    pub fn input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Adds one environment override.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sets the working directory.
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

// --- RESULT MODEL ---

/// The frozen result of one finished stage.
///
/// The response returned by a pipeline run is the last stage's, with every
/// earlier stage available through [`Response::history`] in execution order.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Response {
    command: ArgumentVector,
    std_out: String,
    std_err: String,
    status_code: i32,
    history: Vec<Response>,
}

impl Response {
    /// Builds a response, decoding the captured streams as UTF-8 (lossily).
    pub fn new(command: ArgumentVector, stdout: &[u8], stderr: &[u8], status_code: i32) -> Self {
        Self {
            command,
            std_out: String::from_utf8_lossy(stdout).into_owned(),
            std_err: String::from_utf8_lossy(stderr).into_owned(),
            status_code,
            history: Vec::new(),
        }
    }

    /// Returns the same response with the given earlier stages attached.
    pub fn with_history(self, history: Vec<Self>) -> Self {
        Self { history, ..self }
    }

    /// The argument vector that produced this response.
    pub fn command(&self) -> &ArgumentVector {
        &self.command
    }

    /// Captured standard output.
    pub fn std_out(&self) -> &str {
        &self.std_out
    }

    /// Captured standard error.
    pub fn std_err(&self) -> &str {
        &self.std_err
    }

    /// The raw status reported by the OS. Signal deaths are negative on Unix.
    pub fn status_code(&self) -> i32 {
        self.status_code
    }

    /// Responses of the stages that ran before this one.
    pub fn history(&self) -> &[Self] {
        &self.history
    }

    /// True when the process exited with status 0.
    pub fn is_success(&self) -> bool {
        self.status_code == 0
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.command.program() {
            Some(program) => write!(f, "<Response [{}]>", program),
            None => f.write_str("<Response>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_vector_accessors() {
        let argv = ArgumentVector::from(["tr", "[:lower:]", "[:upper:]"]);
        assert_eq!(argv.program(), Some("tr"));
        assert_eq!(argv.args(), ["[:lower:]", "[:upper:]"]);
        assert_eq!(argv.len(), 3);

        let empty = ArgumentVector::default();
        assert_eq!(empty.program(), None);
        assert!(empty.args().is_empty());
    }

    #[test]
    fn test_argument_vector_display_quotes_spaces() {
        let argv = ArgumentVector::from(["printf", "%s", "two words"]);
        let rendered = argv.to_string();
        assert!(rendered.starts_with("printf "));
        assert_eq!(shlex::split(&rendered), Some(argv.into_inner()));
    }

    #[test]
    fn test_response_display() {
        let response = Response::new(ArgumentVector::from(["echo", "hi"]), b"hi\n", b"", 0);
        assert_eq!(response.to_string(), "<Response [echo]>");

        let empty = Response::new(ArgumentVector::default(), b"", b"", 0);
        assert_eq!(empty.to_string(), "<Response>");
    }

    #[test]
    fn test_response_with_history_keeps_fields() {
        let first = Response::new(ArgumentVector::from(["echo", "hi"]), b"hi", b"", 0);
        let last = Response::new(ArgumentVector::from(["tr", "a-z", "A-Z"]), b"HI", b"warn", 3)
            .with_history(vec![first.clone()]);

        assert_eq!(last.std_out(), "HI");
        assert_eq!(last.std_err(), "warn");
        assert_eq!(last.status_code(), 3);
        assert!(!last.is_success());
        assert_eq!(last.history(), [first]);
    }

    #[test]
    fn test_response_decodes_invalid_utf8_lossily() {
        let response = Response::new(ArgumentVector::from(["cat"]), &[0x66, 0xff, 0x6f], b"", 0);
        assert_eq!(response.std_out(), "f\u{fffd}o");
    }

    #[test]
    fn test_run_options_builder() {
        let options = RunOptions::new()
            .input("Hi")
            .timeout(Duration::from_secs(1))
            .env("A", "1")
            .envs([("B", "2")])
            .capture_limit(10);

        assert_eq!(options.input.as_deref(), Some(&b"Hi"[..]));
        assert_eq!(options.timeout, Some(Duration::from_secs(1)));
        assert_eq!(options.kill_timeout, None);
        assert_eq!(options.env.get("A").map(String::as_str), Some("1"));
        assert_eq!(options.env.get("B").map(String::as_str), Some("2"));
        assert_eq!(options.capture_limit, Some(10));
    }
}
