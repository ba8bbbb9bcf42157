//! Library crate for lab-scan-rs exposing reusable modules.
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod options;
pub mod orchestrator;
pub mod parse;
pub mod render;
pub mod runner;
pub mod server;
pub mod types;
