//! Deterministic, pure logic shared by the clicker.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! snapshots of the game surface and return deterministic outputs suitable
//! for tests.

pub mod error;
pub mod parse;
pub mod plan;
pub mod types;
