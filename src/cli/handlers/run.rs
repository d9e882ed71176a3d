// src/cli/handlers/run.rs

use crate::{
    cli::{args::RunArgs, handlers::commons},
    models::{Response, RunOptions},
};
use anyhow::Result;
use clap::Parser;
use colored::*;

/// Main entry point for the 'run' command.
/// Runs the pipeline and returns the exit code the binary should terminate with.
pub fn handle(args: Vec<String>) -> Result<i32> {
    let run_args = RunArgs::try_parse_from(&args)?;
    let settings = commons::load_settings()?;

    // Flags override the configuration file.
    let mut options = RunOptions::from_settings(&settings);
    if let Some(input) = commons::read_input(run_args.input, run_args.input_file.as_deref())? {
        options.input = Some(input);
    }
    if let Some(timeout) = commons::seconds_flag("timeout", run_args.timeout)? {
        options.timeout = Some(timeout);
    }
    if let Some(kill_timeout) = commons::seconds_flag("kill_timeout", run_args.kill_timeout)? {
        options.kill_timeout = Some(kill_timeout);
    }
    options.env.extend(commons::parse_env_flags(&run_args.env)?);
    if let Some(cwd) = run_args.cwd {
        options.cwd = Some(cwd);
    }
    if let Some(limit) = run_args.capture_limit {
        options.capture_limit = Some(limit);
    }

    let command = commons::command_line(&run_args.command);
    log::debug!("Running '{}' with {:?}", command, options);
    let response = crate::run(command.as_str(), &options)?;

    if run_args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else if run_args.history {
        for stage in response.history() {
            print_stage(stage);
        }
        print_stage(&response);
    } else {
        print!("{}", response.std_out());
        eprint!("{}", response.std_err());
    }

    Ok(commons::exit_code(response.status_code()))
}

/// Prints one stage with a header line, for `--history`.
fn print_stage(response: &Response) {
    let status = response.status_code().to_string();
    let status = if response.is_success() {
        status.green()
    } else {
        status.red().bold()
    };
    println!(
        "{} {} {}",
        "$".dimmed(),
        response.command().to_string().cyan(),
        format!("[{}]", status).dimmed()
    );
    print!("{}", response.std_out());
    if !response.std_err().is_empty() {
        eprint!("{}", response.std_err().yellow());
    }
}
