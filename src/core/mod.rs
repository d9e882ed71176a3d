// src/core/mod.rs

pub mod environment;
pub mod pipeline;
pub mod settings;
pub mod tokenizer;
