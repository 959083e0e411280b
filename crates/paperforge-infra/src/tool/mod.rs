//! Tool service client.

pub mod http;

pub use http::HttpToolExecutor;
