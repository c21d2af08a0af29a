//! # troupe-llm
//!
//! The text-generation contract the runtime is written against.
//!
//! - [`Generator`]: one blocking request/response call,
//!   `generate(system, user, params) -> text`
//! - [`GeneratorFactory`]: builds a generator bound to one credential
//! - [`ProviderError`]: transport, auth, quota and API failures
//! - [`testing`]: scripted generators for tests in downstream crates

#![deny(unsafe_code)]

pub mod provider;
pub mod testing;

pub use provider::{
    GenerationParams, Generator, GeneratorFactory, ProviderError, ProviderResult,
};
