//! `askai` crate (library surface).
//!
//! The primary entrypoint for end users is the `askai` binary (CLI + MCP stdio).
//! This library module exists to support embedding: it re-exports the matching core
//! and the local adapters without depending on internal crate layout.

pub use askai_core as core;
pub use askai_local as local;
