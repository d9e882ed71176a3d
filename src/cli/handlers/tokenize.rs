// src/cli/handlers/tokenize.rs

use crate::cli::{args::TokenizeArgs, handlers::commons};
use anyhow::Result;
use clap::Parser;
use colored::*;

/// Main entry point for the 'tokenize' command.
/// Shows how a command line splits into stages without running anything.
pub fn handle(args: Vec<String>) -> Result<i32> {
    let tokenize_args = TokenizeArgs::try_parse_from(&args)?;
    let command = commons::command_line(&tokenize_args.command);
    let stages = crate::tokenize(command.as_str())?;

    if tokenize_args.json {
        println!("{}", serde_json::to_string_pretty(&stages)?);
        return Ok(0);
    }

    for (index, stage) in stages.iter().enumerate() {
        let words: Vec<String> = stage.iter().map(|word| format!("{:?}", word)).collect();
        println!("{} {}", format!("[{}]", index).yellow(), words.join(" "));
    }
    Ok(0)
}
