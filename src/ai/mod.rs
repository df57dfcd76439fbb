//! Streaming chat exchange over OpenAI-compatible endpoints.
//!
//! Notes:
//! - We use `async-openai` for its HTTP client and stream handling.
//! - For OpenAI-compatible vendors that include extra fields in streaming
//!   deltas, we use async-openai's `byot` ("bring your own types") methods
//!   so deserialization stays tolerant.

mod exchange;
mod stream;
mod types;

pub use exchange::{ExchangeDriver, ExchangeState, SubmitOutcome};
pub use types::{ChatMessage, StreamEvent};
