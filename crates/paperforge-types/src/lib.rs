//! Shared domain types for Paperforge.
//!
//! This crate contains the types used across the Paperforge pipeline:
//! the step catalog identifiers, artifact names, validation outcomes, LLM
//! request/response shapes, tool-service payloads, and configuration.
//!
//! Zero infrastructure dependencies -- only serde, serde_json, thiserror.

pub mod config;
pub mod llm;
pub mod pipeline;
pub mod tool;
