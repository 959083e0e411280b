//! Infrastructure layer for Paperforge.
//!
//! Concrete implementations of the capability traits defined in
//! `paperforge-core`: LLM providers, the HTTP tool-service client, and
//! filesystem persistence of the assembled paper. Also loads configuration.

pub mod config;
pub mod llm;
pub mod storage;
pub mod tool;
