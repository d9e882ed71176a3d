// src/cli/mod.rs

use clap::Parser;

pub mod args;
pub mod handlers;

/// conduit: run shell-style command pipelines without a shell.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    override_usage = "conduit <run|tokenize|connect> <COMMAND>... [OPTIONS]",
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
#[command(disable_help_subcommand = true)]
#[command(trailing_var_arg = true)]
pub struct Cli {
    /// The action to perform (`run`, `tokenize` or `connect`, or one of their aliases).
    pub action: Option<String>,

    /// Everything after the action, handed to the action's own parser.
    #[arg(allow_hyphen_values = true)]
    pub args: Vec<String>,
}
