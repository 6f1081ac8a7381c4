//! Terminal runtime for spoken mock interviews.
//!
//! Wires the `interview-core` coordinator to the console: line-based speech
//! capture, external audio commands, and update rendering. The
//! `interviewer` binary is a thin wrapper around this library.

pub mod config;
pub mod console;
pub mod devices;
