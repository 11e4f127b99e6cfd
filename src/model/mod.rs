//! Model backend integration (OpenAI-compatible chat completions).

mod client;

pub use client::ChatCompletionsClient;
