//! Core synthesis logic: config, templates, resolution and output.

pub mod assembly;
pub mod env;
pub mod parser;
pub mod resolver;
pub mod synth;
pub mod template;
pub mod types;
