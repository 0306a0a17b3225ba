//! EvrimaBot - a Twi-speaking chat assistant
//!
//! This crate provides:
//! - A per-session turn controller over hosted LLM, STT and TTS services
//! - Lazily acquired Gradio speech adapters and a Gemini text adapter
//! - A localized error catalog for every remote-call failure
//! - An HTTP session API and a terminal chat

pub mod agent;
pub mod catalog;
pub mod cli;
pub mod concurrency;
pub mod config;
pub mod llm;
pub mod logging;
pub mod server;
pub mod session;
pub mod speech;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use config::Config;
