//! Business logic and capability trait definitions for Paperforge.
//!
//! This crate defines the "ports" (LLM provider and tool executor traits)
//! that the infrastructure layer implements, plus the workflow engine that
//! drives the paper pipeline. It depends only on `paperforge-types` -- never
//! on `paperforge-infra` or any HTTP/IO crate.

pub mod llm;
pub mod pipeline;
pub mod tool;
