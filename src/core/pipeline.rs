// src/core/pipeline.rs

//! # Pipeline Coordinator
//!
//! Runs the stages of a command one after another, feeding each stage the
//! captured stdout of the previous one, and folds their results into a single
//! [`Response`] whose history holds every earlier stage.

use crate::constants::MAX_PIPE_INPUT_BYTES;
use crate::core::environment;
use crate::core::tokenizer::{TokenizeError, tokenize};
use crate::dev_utils::BlockTimer;
use crate::models::{ArgumentVector, CommandLine, Response, RunOptions};
use crate::system::backend::{Backend, TokioBackend};
use crate::system::executor::{ExecutionError, StageContext, StageRunner, TerminationPolicy};
use crate::system::runtime;
use std::sync::Arc;

/// A parsed, ready-to-run sequence of stages.
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<ArgumentVector>,
    backend: Arc<dyn Backend>,
}

impl Pipeline {
    /// Tokenizes `command` into stages. Nothing is spawned yet.
    pub fn parse(command: impl Into<CommandLine>) -> Result<Self, ExecutionError> {
        Ok(Self {
            stages: tokenize(command)?,
            backend: Arc::new(TokioBackend),
        })
    }

    /// Replaces the process backend.
    pub fn with_backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn stages(&self) -> &[ArgumentVector] {
        &self.stages
    }

    /// Runs every stage in order and returns the last stage's response.
    ///
    /// Each stage is fully captured before the next one is spawned. A stage that
    /// times out or exits non-zero does not stop the pipeline; a stage that cannot
    /// be spawned does, and no partial result is returned.
    pub async fn execute(&self, options: &RunOptions) -> Result<Response, ExecutionError> {
        let env = environment::child_env(&options.env);
        let context = StageContext {
            backend: self.backend.as_ref(),
            env: &env,
            cwd: options.cwd.as_deref(),
            policy: TerminationPolicy::from(options),
            capture_limit: options.capture_limit,
        };
        log::debug!(
            "Running {} stage(s) with the {} backend",
            self.stages.len(),
            self.backend.name()
        );

        let mut responses: Vec<Response> = Vec::with_capacity(self.stages.len());
        let mut next_input = options.input.clone();
        for (index, argv) in self.stages.iter().enumerate() {
            let _timer = BlockTimer::new(format!("stage {} '{}'", index, argv));
            let mut runner = StageRunner::new(argv.clone());
            let output = runner.run(next_input.take(), &context).await?;
            if output.timed_out {
                log::debug!("Stage {} was stopped by its timeout", index);
            }

            let response = Response::new(
                argv.clone(),
                &output.stdout,
                &output.stderr,
                output.status_code,
            );
            next_input = Some(truncate_for_next_stage(output.stdout));
            responses.push(response);
        }

        let last = responses
            .pop()
            .ok_or(ExecutionError::Tokenize(TokenizeError::EmptyCommand))?;
        Ok(last.with_history(responses))
    }

    /// Blocking form of [`Pipeline::execute`].
    pub fn run(&self, options: &RunOptions) -> Result<Response, ExecutionError> {
        runtime::block_on(self.execute(options))?
    }
}

/// Cuts a stage's stdout down to what the next stage is allowed to receive.
pub fn truncate_for_next_stage(mut stdout: Vec<u8>) -> Vec<u8> {
    if stdout.len() > MAX_PIPE_INPUT_BYTES {
        log::trace!(
            "Truncating {} bytes of stage output to {}",
            stdout.len(),
            MAX_PIPE_INPUT_BYTES
        );
        stdout.truncate(MAX_PIPE_INPUT_BYTES);
    }
    stdout
}
