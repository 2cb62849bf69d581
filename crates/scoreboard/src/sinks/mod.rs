//! Sink implementations
//!
//! Contains LogSink, FileSink, and HttpScoreSink.

mod file;
mod http;
mod log;

pub use self::file::{FileSink, FileSinkConfig};
pub use self::http::{HttpScoreSink, HttpSinkConfig};
pub use self::log::LogSink;
