//! Side-effecting operations: configuration, prompt rendering, the inference
//! gateway, child-process plumbing, and transcript export.

pub mod config;
pub mod export;
pub mod gateway;
pub mod process;
pub mod prompt;
