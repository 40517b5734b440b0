//! Colloquy providers — the model-endpoint client and stream plumbing.
//!
//! This crate contains:
//! - **traits**: the `ChatClient` abstraction and the streaming item types
//! - **http_client**: OpenAI-compatible `/chat/completions` client with SSE
//!   streaming and a non-streaming JSON mode for summarization
//! - **demux**: fans one response stream into independent content and
//!   tool-call-fragment queues

pub mod demux;
pub mod http_client;
pub mod traits;

pub use demux::{split, StreamHalves};
pub use http_client::HttpClient;
pub use traits::{
    CallFragment, ChatClient, ChatStream, ClientError, Completion, ResponseDelta,
};
