//! Filesystem persistence for pipeline output.

pub mod paper;

pub use paper::FilesystemPaperSink;
