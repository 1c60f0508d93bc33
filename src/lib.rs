//! sql_replay library - record and replay SQL driver traffic
//!
//! Exposes a database driver surface (connections, commands, parameters,
//! readers, transactions) as a handle-based remote protocol, served either by a
//! proxy that runs statements live and records their results, or by a replayer
//! that answers from recorded results alone.

pub mod backing;
pub mod cache;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod ids;
pub mod ledger;
pub mod logging;
pub mod output;
pub mod protocol;
pub mod server;
pub mod value;

#[macro_use]
pub mod test_macros;

#[cfg(test)]
pub mod test_utils;
