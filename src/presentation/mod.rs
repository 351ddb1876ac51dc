//! Command line surface: argument parsing, report printing and state polling.

pub mod cli;
pub mod monitor;
pub mod report;
