//! Research server client
//!
//! HTTP requests, SSE decoding and the per-session event stream reader.

mod error;
pub mod events;
mod http;
mod reader;
pub mod sse;

pub use error::{ApiError, ApiErrorKind};
pub use events::{DecodeError, ServerEvent};
pub use http::HttpResearchApi;
pub use reader::EventStreamReader;
