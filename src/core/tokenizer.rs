//! # Command Tokenizer
//!
//! Turns a shell-like command line into one [`ArgumentVector`] per pipeline stage.
//! Only pipes and POSIX quoting are understood: there is no redirection, globbing
//! or control operators.

use crate::models::{ArgumentVector, CommandLine};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("Command could not be parsed (unbalanced quotes or dangling escape): {0}")]
    MalformedCommand(String),
    #[error("No command specified to run.")]
    EmptyCommand,
}

/// Splits a command into its pipeline stages.
///
/// Pre-built stages are passed through untouched. Raw strings are split on `|`
/// first (quoted or escaped pipes are kept), then each segment is split into
/// words with shell quoting rules.
///
/// # Errors
/// * `MalformedCommand` if a quote is never closed or the line ends in a lone `\`.
/// * `EmptyCommand` if no stage contains any word.
pub fn tokenize(command: impl Into<CommandLine>) -> Result<Vec<ArgumentVector>, TokenizeError> {
    match command.into() {
        CommandLine::Stages(stages) => {
            if stages.is_empty() || stages.iter().any(|stage| stage.is_empty()) {
                return Err(TokenizeError::EmptyCommand);
            }
            Ok(stages)
        }
        CommandLine::Raw(line) => tokenize_line(&line),
    }
}

fn tokenize_line(line: &str) -> Result<Vec<ArgumentVector>, TokenizeError> {
    let mut stages = Vec::new();
    for segment in split_pipeline(line)? {
        let words = shlex::split(segment)
            .ok_or_else(|| TokenizeError::MalformedCommand(line.to_string()))?;
        // `a || b` and a trailing `|` leave word-less segments behind. They are skipped.
        if words.is_empty() {
            continue;
        }
        stages.push(ArgumentVector::new(words));
    }

    if stages.is_empty() {
        return Err(TokenizeError::EmptyCommand);
    }
    log::trace!("Tokenized '{}' into {} stage(s)", line, stages.len());
    Ok(stages)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

/// Splits `line` on every `|` that is not inside quotes or escaped.
/// Segments keep their quotes so the word splitter sees them unchanged.
fn split_pipeline(line: &str) -> Result<Vec<&str>, TokenizeError> {
    let mut segments = Vec::new();
    let mut quote = Quote::None;
    let mut escaped = false;
    let mut start = 0;

    for (pos, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, ch) {
            // Backslash is literal inside single quotes.
            (Quote::None | Quote::Double, '\\') => escaped = true,
            (Quote::None, '\'') => quote = Quote::Single,
            (Quote::None, '"') => quote = Quote::Double,
            (Quote::Single, '\'') | (Quote::Double, '"') => quote = Quote::None,
            (Quote::None, '|') => {
                segments.push(line.get(start..pos).unwrap_or_default());
                start = pos + ch.len_utf8();
            }
            _ => {}
        }
    }

    if quote != Quote::None || escaped {
        return Err(TokenizeError::MalformedCommand(line.to_string()));
    }
    segments.push(line.get(start..).unwrap_or_default());
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stages(words: &[&[&str]]) -> Vec<ArgumentVector> {
        words
            .iter()
            .map(|stage| stage.iter().copied().collect())
            .collect()
    }

    #[test]
    fn test_tokenize_pipeline_with_quotes() {
        let result = tokenize("echo -n 'hi'| tr [:lower:] [:upper:]").unwrap();
        assert_eq!(
            result,
            stages(&[&["echo", "-n", "hi"], &["tr", "[:lower:]", "[:upper:]"]])
        );
    }

    #[test]
    fn test_tokenize_single_stage() {
        let result = tokenize("sed s/i/I/g").unwrap();
        assert_eq!(result, stages(&[&["sed", "s/i/I/g"]]));
    }

    #[test]
    fn test_quoted_pipe_is_not_a_separator() {
        let result = tokenize(r#"echo 'a|b' "c|d" | cat"#).unwrap();
        assert_eq!(result, stages(&[&["echo", "a|b", "c|d"], &["cat"]]));
    }

    #[test]
    fn test_escaped_pipe_is_not_a_separator() {
        let result = tokenize(r"echo a\|b").unwrap();
        assert_eq!(result, stages(&[&["echo", "a|b"]]));
    }

    #[test]
    fn test_quoted_argument_with_spaces_stays_whole() {
        let result = tokenize(r#"python -c 'print "quoted args"'"#).unwrap();
        assert_eq!(result, stages(&[&["python", "-c", r#"print "quoted args""#]]));
    }

    #[test]
    fn test_three_stages() {
        let result = tokenize("yes|head -n 10 |wc -l").unwrap();
        assert_eq!(
            result,
            stages(&[&["yes"], &["head", "-n", "10"], &["wc", "-l"]])
        );
    }

    #[test]
    fn test_empty_segments_are_skipped() {
        let result = tokenize("echo hi || cat |").unwrap();
        assert_eq!(result, stages(&[&["echo", "hi"], &["cat"]]));
    }

    #[test]
    fn test_unbalanced_quotes_are_malformed() {
        assert!(matches!(
            tokenize("echo 'unterminated"),
            Err(TokenizeError::MalformedCommand(_))
        ));
        assert!(matches!(
            tokenize(r#"echo "open | cat"#),
            Err(TokenizeError::MalformedCommand(_))
        ));
        assert!(matches!(
            tokenize(r"echo trailing\"),
            Err(TokenizeError::MalformedCommand(_))
        ));
    }

    #[test]
    fn test_blank_command_is_empty() {
        assert_eq!(tokenize("   "), Err(TokenizeError::EmptyCommand));
        assert_eq!(tokenize(" | "), Err(TokenizeError::EmptyCommand));
    }

    #[test]
    fn test_prebuilt_stages_pass_through() {
        let prebuilt = stages(&[&["echo", "it's | not parsed"], &["cat"]]);
        let result = tokenize(prebuilt.clone()).unwrap();
        assert_eq!(result, prebuilt);
    }

    #[test]
    fn test_prebuilt_empty_stage_is_rejected() {
        let prebuilt = vec![ArgumentVector::from(["echo"]), ArgumentVector::default()];
        assert_eq!(tokenize(prebuilt), Err(TokenizeError::EmptyCommand));
        assert_eq!(
            tokenize(Vec::<ArgumentVector>::new()),
            Err(TokenizeError::EmptyCommand)
        );
    }
}
