//! Streaming multipart upload ingestion with throttled progress reporting.
//!
//! Each file part of an upload request becomes a [`pipeline::FilePipeline`]
//! that streams chunk by chunk through a [`transform::ProgressTransform`]
//! into a [`sink::FileSink`]. Progress reaches the request's subscriber at
//! most once per [`rate_gate::RateGate`] window. An
//! [`session::UploadSession`] tracks all pipelines of one request and
//! reports per-file outcomes once they have all settled.

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod rate_gate;
pub mod server;
pub mod session;
pub mod sink;
pub mod state;
pub mod transform;
pub mod utils;
