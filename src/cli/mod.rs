//! CLI module for cartpilot - command-line interface and subcommands.
//!
//! The binary is an operator aid: it inspects configuration, the tool catalog
//! and experience memory. Runs are driven through the library.

pub mod commands;

pub use commands::Cli;
