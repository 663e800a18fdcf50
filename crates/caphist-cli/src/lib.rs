//! Library side of the `caphist` command: job configuration, logging setup,
//! and the staged pipeline.

pub mod config;
pub mod logging;
pub mod pipeline;
pub mod types;
