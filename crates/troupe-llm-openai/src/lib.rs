//! # troupe-llm-openai
//!
//! Chat-completions generator for `OpenAI`-compatible endpoints (`DeepSeek`,
//! `OpenAI`, local gateways).
//!
//! Implements [`Generator`](troupe_llm::Generator) and
//! [`GeneratorFactory`](troupe_llm::GeneratorFactory) from `troupe-llm`:
//!
//! - [`types`]: configuration plus request and response wire structures
//! - [`provider`]: `ChatCompletionsProvider` and `ChatCompletionsFactory`
//!
//! One non-streaming `POST {base_url}/chat/completions` per call, authenticated
//! with a Bearer credential. The reply text is `choices[0].message.content`.

#![deny(unsafe_code)]

pub mod provider;
pub mod types;

pub use provider::{ChatCompletionsFactory, ChatCompletionsProvider};
pub use types::ChatCompletionsConfig;
