//! The host-facing plugin and its settings.

use std::fmt;
use std::sync::Arc;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::encoder::SegmentEncoder;
use crate::error::Result;
use crate::pipeline::{DeviceHint, PipelineLoader, SynthesisEngine};

/// Settings a host passes when it creates the plugin.
///
/// ```
/// use kokoro_tools::{DeviceHint, PluginConfigBuilder};
///
/// let config = PluginConfigBuilder::default()
///     .voice("bf_emma")
///     .lang_code("b")
///     .device(DeviceHint::Cpu)
///     .build()
///     .unwrap();
/// assert_eq!(config.voice, "bf_emma");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(default)]
#[serde(default)]
pub struct PluginConfig {
    /// Language the pipeline is built for. Fixed once the pipeline exists.
    #[builder(setter(into))]
    pub lang_code: String,
    /// Voice used for every request (e.g. `"af_heart"`).
    #[builder(setter(into))]
    pub voice: String,
    #[builder(setter(into))]
    pub device: DeviceHint,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            lang_code: "a".to_string(),
            voice: "af_heart".to_string(),
            device: DeviceHint::Auto,
        }
    }
}

impl PluginConfig {
    /// Parse host settings. Missing keys keep their defaults.
    pub fn from_json(settings: &str) -> serde_json::Result<Self> {
        serde_json::from_str(settings)
    }
}

/// Text-to-speech plugin answering both the media-converter and the LLM-tool
/// capabilities.
///
/// Both capabilities share one [`SynthesisEngine`]; clone the `Arc` to hand
/// the same engine to several plugins.
pub struct KokoroPlugin<L: PipelineLoader> {
    engine: Arc<SynthesisEngine<L>>,
    encoder: SegmentEncoder,
    config: PluginConfig,
}

impl<L: PipelineLoader> KokoroPlugin<L> {
    /// Create a plugin with its own engine.
    pub fn new(loader: L, config: PluginConfig) -> Self {
        Self::with_engine(Arc::new(SynthesisEngine::new(loader)), config)
    }

    /// Create a plugin on top of an existing engine.
    pub fn with_engine(engine: Arc<SynthesisEngine<L>>, config: PluginConfig) -> Self {
        Self {
            engine,
            encoder: SegmentEncoder::default(),
            config,
        }
    }

    pub fn with_encoder(mut self, encoder: SegmentEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn engine(&self) -> &Arc<SynthesisEngine<L>> {
        &self.engine
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub(crate) fn encoder(&self) -> &SegmentEncoder {
        &self.encoder
    }

    pub(crate) fn pipeline(&self) -> Result<Arc<L::Pipeline>> {
        self.engine
            .ensure_ready(&self.config.lang_code, &self.config.device)
    }
}

impl<L: PipelineLoader> fmt::Debug for KokoroPlugin<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KokoroPlugin")
            .field("engine", &self.engine)
            .field("encoder", &self.encoder)
            .field("config", &self.config)
            .finish()
    }
}
