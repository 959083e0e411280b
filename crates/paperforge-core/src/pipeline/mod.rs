//! Paper pipeline orchestration.
//!
//! The engine walks the step catalog in order, runs each step's handler,
//! asks the validator to judge the result, and either commits the step's
//! artifacts or rolls back to an earlier step with corrective advice.
//!
//! - `graph`: step catalog, artifact dependencies, rollback resolution
//! - `store`: per-run artifact store
//! - `advice`: one-shot corrective advice keyed by step
//! - `retry`: bounded retry with per-call timeout for LLM and tool calls
//! - `gateway`: retried LLM and tool access for handlers
//! - `validator`: LLM judge and verdict parsing
//! - `handler`: step handler trait and context
//! - `steps`: the concrete step handlers
//! - `assembler`: final paper rendering
//! - `engine`: the control loop

pub mod advice;
pub mod assembler;
pub mod engine;
pub mod gateway;
pub mod graph;
pub mod handler;
pub mod prompt;
pub mod retry;
pub mod steps;
pub mod store;
pub mod validator;

#[cfg(test)]
pub(crate) mod testing;
