//! Speech synthesis backends.
//!
//! Each backend provides a [`PipelineLoader`](crate::PipelineLoader) whose
//! pipelines plug into [`KokoroPlugin`](crate::KokoroPlugin).
//!
//! # Available Engines
//!
//! Enable engines via Cargo features:
//! - `kokoro` - Kokoro TTS (ONNX format, espeak-ng required)
//! - `coreml` - Kokoro with the CoreML execution provider (Apple silicon)

#[cfg(feature = "kokoro")]
pub mod kokoro;
