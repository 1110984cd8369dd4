//! cinder-server: the TCP front end.
//!
//! Accepts RESP2 connections, parses frames into commands, executes
//! them against the sharded engine, and writes replies. Exposed as a
//! library so integration tests can run the full server in-process.

pub mod config;
pub mod connection;
pub mod server;
