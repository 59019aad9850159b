//! # kokoro-tools
//!
//! Kokoro text-to-speech exposed to a plugin host through two capabilities:
//! an LLM tool (`generate-audio`) that returns base64 OGG segments, and a
//! media converter that turns `text/plain` into a single WAV, OGG, MP3 or
//! FLAC blob.
//!
//! ## Features
//!
//! - **Lazy pipeline**: the speech model is loaded on first use, once per process
//! - **Segment encoding**: raw 24 kHz samples to WAV, OGG, MP3 or FLAC
//! - **Kokoro engine**: ONNX-based synthesis behind the `kokoro` feature
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! kokoro-tools = { version = "2026.2", features = ["kokoro"] }
//! ```
//!
//! ```ignore
//! use kokoro_tools::engines::kokoro::{create_plugin, KokoroModelParams};
//! use kokoro_tools::{LlmTools, MediaConverter, PluginConfig};
//!
//! let plugin = create_plugin(KokoroModelParams::default(), PluginConfig::default());
//!
//! let wav = plugin.convert_media("Hello, world!", "text/plain", "audio/wav", None)?;
//! let result = plugin.call_llm_tool("generate-audio", &serde_json::json!({ "text": "Hi." }))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod catalog;
pub mod converter;
pub mod encoder;
pub mod engines;
pub mod error;
pub mod pipeline;
pub mod plugin;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_support;

pub use catalog::{llm_tools, ToolDeclaration, GENERATE_AUDIO_TOOL};
pub use converter::{MediaConverter, MediaOptions};
pub use encoder::{AudioFormat, EncoderConfig, SegmentEncoder};
pub use error::{BoxError, Error, ErrorKind, Result};
pub use pipeline::{DeviceHint, PipelineConfig, PipelineLoader, SynthesisEngine};
pub use plugin::{KokoroPlugin, PluginConfig, PluginConfigBuilder};
pub use tools::{LlmTools, ToolContent, ToolResult};

/// Sample rate of every segment a pipeline produces.
pub const SAMPLE_RATE: u32 = 24000;

/// One unit of synthesized speech.
///
/// Carries the text it was produced from alongside the raw mono samples so
/// callers can log or caption what they are about to encode.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    /// Original text span
    pub graphemes: String,
    /// Phoneme span fed to the model
    pub phonemes: String,
    /// Raw audio samples as f32 values at [`SAMPLE_RATE`]
    pub samples: Vec<f32>,
}

impl AudioSegment {
    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / SAMPLE_RATE as f64
    }
}

/// How a pipeline cuts input text into segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitPattern {
    /// Treat the whole input as one unit.
    None,
    /// Let the engine pick unit boundaries.
    #[default]
    Default,
}

/// Lazy, ordered, finite sequence of segments.
pub type Segments<'a> = Box<dyn Iterator<Item = Result<AudioSegment>> + 'a>;

/// A loaded speech model bound to a language and a compute device.
///
/// Implementations must be shareable across threads; a pipeline is built once
/// and only invoked afterwards.
pub trait SpeechPipeline: Send + Sync {
    /// Synthesize `text` with `voice`.
    ///
    /// Segments come out in reading order. Work for a segment happens when the
    /// iterator reaches it, so dropping the iterator early skips the rest.
    fn synthesize<'a>(&'a self, text: &'a str, voice: &'a str, split: SplitPattern)
        -> Segments<'a>;
}
