//! Core types shared by every stage of the update pipeline.
//!
//! At the moment this is the error taxonomy; see [`error`] for how soft failures,
//! recoverable environment issues and fatal failures are told apart.

pub mod error;

pub use error::TriggerError;
