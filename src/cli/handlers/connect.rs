// src/cli/handlers/connect.rs

use crate::{
    cli::{args::ConnectArgs, handlers::commons},
    models::ConnectOptions,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::BufRead;

/// Main entry point for the 'connect' command.
///
/// Starts the process, forwards this process's stdin to it line by line, closes
/// its stdin at end of input and then prints everything it wrote.
pub fn handle(args: Vec<String>) -> Result<i32> {
    let connect_args = ConnectArgs::try_parse_from(&args)?;
    let settings = commons::load_settings()?;

    let mut options = ConnectOptions::from_settings(&settings);
    if let Some(input) = connect_args.input {
        options.input = Some(input.into_bytes());
    }
    options.env.extend(commons::parse_env_flags(&connect_args.env)?);
    if let Some(cwd) = connect_args.cwd {
        options.cwd = Some(cwd);
    }

    let command = commons::command_line(&connect_args.command);
    let mut connection = crate::connect(command.as_str(), &options)?;
    log::debug!("Connected to '{}' (PID: {:?})", command, connection.pid());

    for line in std::io::stdin().lock().lines() {
        let line = line.context("Failed to read standard input")?;
        if let Err(e) = connection.send(&line) {
            // The process stopped reading; keep whatever it produced.
            log::warn!("Stopped forwarding input: {}", e);
            break;
        }
    }
    connection.close_stdin();

    let status_code = connection.block()?;
    print!("{}", connection.std_out());
    eprint!("{}", connection.std_err());
    Ok(commons::exit_code(status_code))
}
