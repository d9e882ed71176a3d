// src/cli/handlers/commons.rs

// Helpers shared by the handlers: settings, flag conversion and exit codes.

use crate::core::environment;
use crate::core::settings::{self, Settings};
use anyhow::{Context, Result, anyhow};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Loads the user's settings, logging where they came from.
pub fn load_settings() -> Result<Settings> {
    let settings = Settings::load().context("Failed to load the conduit configuration")?;
    log::debug!("Effective settings: {:?}", settings);
    Ok(settings)
}

/// Joins the positional words of a command back into one command line.
///
/// A single word is the command line itself (`conduit run "echo hi | wc -c"`).
/// With several words the shell already removed their quotes, so words holding
/// whitespace or quote characters are quoted again to stay one argument. Bare
/// words such as a lone `|` keep their meaning.
pub fn command_line(words: &[String]) -> String {
    if let [line] = words {
        return line.clone();
    }
    words
        .iter()
        .map(String::as_str)
        .map(requote)
        .collect::<Vec<_>>()
        .join(" ")
}

fn requote(word: &str) -> String {
    let needs_quotes = word.is_empty()
        || word
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '\'' | '"' | '\\' | '#'));
    if !needs_quotes {
        return word.to_string();
    }
    match shlex::try_quote(word) {
        Ok(quoted) => quoted.into_owned(),
        Err(e) => {
            log::warn!("Cannot quote '{}' ({}); passing it unquoted.", word, e);
            word.to_string()
        }
    }
}

/// Parses `KEY=VALUE` flags into an override map.
pub fn parse_env_flags(assignments: &[String]) -> Result<BTreeMap<String, String>> {
    assignments
        .iter()
        .map(|assignment| {
            environment::parse_assignment(assignment).ok_or_else(|| {
                anyhow!(
                    "Invalid environment assignment '{}'. Expected KEY=VALUE.",
                    assignment
                )
            })
        })
        .collect()
}

/// Converts a seconds flag into a duration, rejecting negative and non-finite values.
pub fn seconds_flag(key: &'static str, value: Option<f64>) -> Result<Option<Duration>> {
    value
        .map(|secs| settings::parse_seconds(key, secs))
        .transpose()
        .map_err(Into::into)
}

/// Reads the bytes for `--input` / `--input-file`. `-` means this process's stdin.
pub fn read_input(text: Option<String>, file: Option<&Path>) -> Result<Option<Vec<u8>>> {
    if let Some(text) = text {
        return Ok(Some(text.into_bytes()));
    }
    let Some(path) = file else {
        return Ok(None);
    };
    if path == Path::new("-") {
        let mut buffer = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buffer)
            .context("Failed to read standard input")?;
        return Ok(Some(buffer));
    }
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read input file '{}'", path.display()))?;
    Ok(Some(bytes))
}

/// Maps a response status to a process exit code the way shells do:
/// a death by signal N becomes 128 + N, an unknown status becomes 1.
pub fn exit_code(status_code: i32) -> i32 {
    match status_code {
        code if code >= 0 => code,
        -1 => 1,
        signal => 128_i32.saturating_add(signal.saturating_neg()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(exit_code(0), 0);
        assert_eq!(exit_code(3), 3);
        assert_eq!(exit_code(-15), 143);
        assert_eq!(exit_code(-9), 137);
        assert_eq!(exit_code(-1), 1);
    }

    #[test]
    fn test_command_line_keeps_multi_word_arguments() {
        let words: Vec<String> = ["printf", "%s", "a b", "|", "tr", "a-z", "A-Z"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let line = command_line(&words);

        let stages = crate::tokenize(line.as_str()).unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].args(), ["%s", "a b"]);
        assert_eq!(stages[1].program(), Some("tr"));
    }

    #[test]
    fn test_command_line_single_word_is_taken_verbatim() {
        let words = vec!["echo 'a b' | wc -c".to_string()];
        assert_eq!(command_line(&words), "echo 'a b' | wc -c");
    }

    #[test]
    fn test_parse_env_flags() {
        let flags = vec!["A=1".to_string(), "B=x=y".to_string()];
        let env = parse_env_flags(&flags).unwrap();

        assert_eq!(env.get("A").map(String::as_str), Some("1"));
        assert_eq!(env.get("B").map(String::as_str), Some("x=y"));
        assert!(parse_env_flags(&["NOVALUE".to_string()]).is_err());
    }

    #[test]
    fn test_seconds_flag() {
        assert_eq!(
            seconds_flag("timeout", Some(0.5)).unwrap(),
            Some(Duration::from_millis(500))
        );
        assert_eq!(seconds_flag("timeout", None).unwrap(), None);
        assert!(seconds_flag("timeout", Some(-1.0)).is_err());
    }

    #[test]
    fn test_read_input_prefers_text_and_reads_files() {
        // --- Setup ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.txt");
        std::fs::write(&path, "from file").unwrap();

        assert_eq!(
            read_input(Some("inline".to_string()), None).unwrap(),
            Some(b"inline".to_vec())
        );
        assert_eq!(
            read_input(None, Some(&path)).unwrap(),
            Some(b"from file".to_vec())
        );
        assert_eq!(read_input(None, None).unwrap(), None);
        assert!(read_input(None, Some(&dir.path().join("missing"))).is_err());
    }
}
