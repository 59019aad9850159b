//! Kokoro-82M text-to-speech pipeline.
//!
//! Runs the Kokoro-82M ONNX model through `ort`, with espeak-ng for
//! phonemization. A [`KokoroPipeline`] is bound to one language; the voice is
//! chosen per request.
//!
//! # System Requirements
//!
//! **espeak-ng** must be installed on your system:
//! - **Linux**: `sudo apt-get install espeak-ng`
//! - **macOS**: `brew install espeak-ng`
//! - **Windows**: Download installer from <https://espeak-ng.org/download>
//!
//! # Model Directory Layout
//!
//! ```text
//! models/kokoro/
//! ├── kokoro-quant-convinteger.onnx   # 8-bit quantized model (88MB, CPU-optimized)
//! ├── voices-v1.0.bin                  # Voice data archive (.npz format)
//! └── config.json                      # Optional vocabulary
//! ```
//!
//! Download links:
//! - Model: <https://github.com/taylorchu/kokoro-onnx/releases/tag/v0.2.0>
//! - Voices: <https://github.com/thewh1teagle/kokoro-onnx/releases/tag/model-files-v1.0>
//!
//! # Language Codes
//!
//! | Code | Language | espeak-ng | Voice prefixes |
//! |---|---|---|---|
//! | `a` | American English | `en-us` | `af_`, `am_` |
//! | `b` | British English | `en-gb` | `bf_`, `bm_` |
//! | `e` | Spanish | `es` | `ef_`, `em_` |
//! | `f` | French | `fr` | `ff_` |
//! | `h` | Hindi | `hi` | `hf_`, `hm_` |
//! | `i` | Italian | `it` | `if_`, `im_` |
//! | `j` | Japanese | `ja` | `jf_`, `jm_` |
//! | `p` | Brazilian Portuguese | `pt-br` | `pf_`, `pm_` |
//! | `z` | Mandarin Chinese | `cmn` | `zf_`, `zm_` |
//!
//! # Segmentation
//!
//! With [`SplitPattern::Default`](crate::SplitPattern::Default) the text is
//! cut on newlines. Each unit is then cut again into chunks of at most
//! [`model::MAX_PHONEME_LEN`] phonemes, so even unsplit text can produce more
//! than one segment.
//!
//! # Example
//!
//! ```rust,no_run
//! use kokoro_tools::engines::kokoro::{create_plugin, KokoroModelParams};
//! use kokoro_tools::{MediaConverter, PluginConfig};
//!
//! let params = KokoroModelParams {
//!     model_dir: "models/kokoro".into(),
//!     ..Default::default()
//! };
//! let plugin = create_plugin(params, PluginConfig::default());
//! let ogg = plugin.convert_media("Hello, world!", "text/plain", "audio/ogg", None)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod model;
pub mod phonemizer;
pub mod pipeline;
pub mod vocab;
pub mod voices;

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::pipeline::SynthesisEngine;
use crate::plugin::{KokoroPlugin, PluginConfig};

pub use model::KokoroError;
pub use phonemizer::EspeakConfig;
pub use pipeline::{KokoroLoader, KokoroModelParams, KokoroPipeline};

static SHARED_ENGINE: OnceCell<Arc<SynthesisEngine<KokoroLoader>>> = OnceCell::new();

/// The process-wide Kokoro engine.
///
/// `params` only take effect on the first call.
pub fn shared_engine(params: KokoroModelParams) -> Arc<SynthesisEngine<KokoroLoader>> {
    let engine = SHARED_ENGINE
        .get_or_init(|| Arc::new(SynthesisEngine::new(KokoroLoader::new(params))));
    Arc::clone(engine)
}

/// Create a plugin backed by the process-wide Kokoro engine.
pub fn create_plugin(
    params: KokoroModelParams,
    config: PluginConfig,
) -> KokoroPlugin<KokoroLoader> {
    KokoroPlugin::with_engine(shared_engine(params), config)
}
