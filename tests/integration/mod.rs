//! Integration test suite for update-trigger
//!
//! End-to-end tests that run the whole pipeline against a loopback update server.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **pipeline**: Library-level runs of the full check, gate, download and launch
//!   sequence with a recording launcher
//! - **cli**: The `update-trigger` binary, including a real detached handoff on Unix

mod cli;
mod pipeline;
