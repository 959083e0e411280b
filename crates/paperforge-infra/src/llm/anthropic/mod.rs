//! Anthropic Claude LLM provider implementation.
//!
//! This module provides the [`AnthropicProvider`] which implements the
//! [`LlmProvider`](paperforge_core::llm::provider::LlmProvider) trait for
//! the Anthropic Messages API (non-streaming).

pub mod client;
pub mod types;

pub use client::AnthropicProvider;
