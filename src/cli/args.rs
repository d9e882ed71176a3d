// src/cli/args.rs

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)] // The action name has already been consumed by the dispatcher.
pub struct RunArgs {
    /// The command to run, e.g. "cat data.txt | sort | uniq -c". Several words are joined with spaces.
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Text written to the first stage's stdin.
    #[arg(long, conflicts_with = "input_file")]
    pub input: Option<String>,

    /// File whose contents are written to the first stage's stdin ("-" reads this process's stdin).
    #[arg(long)]
    pub input_file: Option<PathBuf>,

    /// Seconds each stage may run before it is terminated.
    #[arg(long, short)]
    pub timeout: Option<f64>,

    /// Seconds between the terminate and the kill signal.
    #[arg(long)]
    pub kill_timeout: Option<f64>,

    /// Extra environment variables for every stage (e.g., "KEY=VALUE").
    #[arg(long, short, value_delimiter = ',', num_args = 1..)]
    pub env: Vec<String>,

    /// Working directory of every stage.
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Maximum bytes kept per captured stream and stage.
    #[arg(long)]
    pub capture_limit: Option<usize>,

    /// Also print the output of every earlier stage.
    #[arg(long)]
    pub history: bool,

    /// Print the full response as JSON instead of the raw output.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)]
pub struct TokenizeArgs {
    /// The command to split into stages.
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Print the stages as a JSON array of arrays.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)]
pub struct ConnectArgs {
    /// The command to start. Pipes are not allowed.
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Text written to stdin right after the process starts.
    #[arg(long)]
    pub input: Option<String>,

    /// Extra environment variables (e.g., "KEY=VALUE").
    #[arg(long, short, value_delimiter = ',', num_args = 1..)]
    pub env: Vec<String>,

    /// Working directory of the process.
    #[arg(long)]
    pub cwd: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_collects_flags_and_command() {
        let args = RunArgs::try_parse_from([
            "--timeout",
            "1.5",
            "--env",
            "A=1,B=2",
            "--history",
            "echo hi | tr a-z A-Z",
        ])
        .unwrap();

        assert_eq!(args.command, ["echo hi | tr a-z A-Z"]);
        assert_eq!(args.timeout, Some(1.5));
        assert_eq!(args.env, ["A=1", "B=2"]);
        assert!(args.history);
        assert!(!args.json);
    }

    #[test]
    fn test_run_args_keeps_trailing_words() {
        let args = RunArgs::try_parse_from(["--json", "ls", "-la", "/tmp"]).unwrap();

        assert_eq!(args.command, ["ls", "-la", "/tmp"]);
        assert!(args.json);
    }

    #[test]
    fn test_run_args_requires_command() {
        assert!(RunArgs::try_parse_from(["--json"]).is_err());
    }

    #[test]
    fn test_run_args_input_conflicts_with_input_file() {
        let result = RunArgs::try_parse_from(["--input", "x", "--input-file", "f", "cat"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_connect_args() {
        let args = ConnectArgs::try_parse_from(["--cwd", "/tmp", "cat"]).unwrap();
        assert_eq!(args.command, ["cat"]);
        assert_eq!(args.cwd, Some(PathBuf::from("/tmp")));
    }
}
