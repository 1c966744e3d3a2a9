//! # Telemetry Module
//!
//! Persists decoded bus traffic to JSONL files.
//!
//! This module handles:
//! - Timestamping capture events
//! - Formatting as JSONL (JSON Lines)
//! - Writing to an append-only capture log

pub mod capture_log;

pub use capture_log::JsonlCaptureLog;
