//! micro-sql - a micro read-only SQL client that times every query.
//!
//! This library exposes the core modules for use in integration tests.

pub mod cli;
pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod logging;
pub mod query;
pub mod repl;
pub mod safety;
pub mod session;
