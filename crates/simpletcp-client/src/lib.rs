//! Client role and the `simpletcp` command-line interface.
//!
//! This crate provides the connecting side of a simpletcp transport
//! ([`Client`]) and the `simpletcp` binary, which can run either role.

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::Cli;
pub use client::{Client, ClientEvent, ClientState};
pub use config::{ClientConfig, Settings};
pub use error::{ClientError, ClientResult};
