// src/bin/conduit.rs

use anyhow::{Result, anyhow};
use clap::Parser;
use colored::*;
use conduit::cli::{Cli, handlers};

// --- Command Definition and Registry ---

/// Defines a command, its aliases, and its handler.
/// Every handler returns the exit code of the process it ran.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(Vec<String>) -> Result<i32>,
}

/// The single source of truth for all commands.
static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "connect",
        aliases: &["attach"],
        handler: handlers::connect::handle,
    },
    CommandDefinition {
        name: "run",
        aliases: &["r"],
        handler: handlers::run::handle,
    },
    CommandDefinition {
        name: "tokenize",
        aliases: &["split"],
        handler: handlers::tokenize::handle,
    },
];

/// Finds a command definition in the registry by its name or alias.
fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// The main entry point of the `conduit` application.
/// It sets up logging, parses arguments, dispatches to the correct handler,
/// and performs centralized error handling.
fn main() {
    env_logger::init();

    match run_cli(Cli::parse()) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            // clap errors render their own usage and help output.
            if let Some(clap_err) = e.downcast_ref::<clap::Error>() {
                clap_err.exit();
            }
            eprintln!("\n{}: {}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

/// Routes the first argument to its handler. Anything that is not a known
/// action is treated as the command of an implicit `run`.
fn run_cli(cli: Cli) -> Result<i32> {
    log::debug!("CLI args parsed: {:?}", cli);

    let Some(action) = cli.action else {
        return Err(anyhow!(
            "No command given. Try `conduit run \"echo hello | tr a-z A-Z\"`."
        ));
    };

    match find_command(&action) {
        Some(command) => (command.handler)(cli.args),
        None => {
            let mut run_args = vec![action];
            run_args.extend(cli.args);
            handlers::run::handle(run_args)
        }
    }
}
