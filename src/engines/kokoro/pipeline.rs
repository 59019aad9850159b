use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{BoxError, Error};
use crate::pipeline::{PipelineConfig, PipelineLoader};
use crate::{AudioSegment, Segments, SpeechPipeline, SplitPattern};

use super::model::{split_phonemes, KokoroError, KokoroModel};
use super::phonemizer::{espeak_language, phonemize, voice_lang, EspeakConfig};
use super::vocab::Vocab;
use super::voices::VoiceStore;

/// Parameters for loading Kokoro and running it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KokoroModelParams {
    /// Directory with the `.onnx` model, `voices-v1.0.bin` and optionally
    /// `config.json`.
    pub model_dir: PathBuf,
    /// Number of CPU threads to use for inference.
    /// `None` uses the ORT default (typically all available cores).
    pub num_threads: Option<usize>,
    /// Path for caching the Level3-optimized ONNX graph.
    ///
    /// Must be writable; bundled resource directories may be read-only.
    pub optimized_model_cache_path: Option<PathBuf>,
    /// Speech speed multiplier. Range: 0.5–2.0, default 1.0.
    pub speed: f32,
    pub espeak: EspeakConfig,
}

impl Default for KokoroModelParams {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models/kokoro"),
            num_threads: None,
            optimized_model_cache_path: None,
            speed: 1.0,
            espeak: EspeakConfig::default(),
        }
    }
}

/// Builds [`KokoroPipeline`]s from a model directory.
#[derive(Debug, Clone, Default)]
pub struct KokoroLoader {
    params: KokoroModelParams,
}

impl KokoroLoader {
    pub fn new(params: KokoroModelParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &KokoroModelParams {
        &self.params
    }

    fn load_pipeline(&self, config: &PipelineConfig) -> Result<KokoroPipeline, KokoroError> {
        let language = espeak_language(&config.lang_code)
            .ok_or_else(|| KokoroError::UnsupportedLanguage(config.lang_code.clone()))?;

        let model_dir = &self.params.model_dir;
        let model = KokoroModel::load(
            model_dir,
            config.device.as_deref(),
            self.params.num_threads,
            self.params.optimized_model_cache_path.as_deref(),
        )?;

        let voices_path = model_dir.join("voices-v1.0.bin");
        if !voices_path.exists() {
            return Err(KokoroError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!(
                    "Voice file not found at {}. Download it from the Kokoro model repository.",
                    voices_path.display()
                ),
            )));
        }
        let voices = VoiceStore::load(&voices_path)?;

        let config_path = model_dir.join("config.json");
        let vocab = if config_path.exists() {
            log::info!("Loading vocab from config.json");
            Vocab::load(&config_path)?
        } else {
            log::warn!("config.json not found, using built-in vocab");
            Vocab::builtin()
        };

        Ok(KokoroPipeline {
            model: Mutex::new(model),
            voices,
            vocab,
            language,
            speed: self.params.speed,
            espeak: self.params.espeak.clone(),
        })
    }
}

impl PipelineLoader for KokoroLoader {
    type Pipeline = KokoroPipeline;

    fn accelerators(&self) -> &[&'static str] {
        if cfg!(feature = "coreml") {
            &["coreml"]
        } else {
            &[]
        }
    }

    fn load(&self, config: &PipelineConfig) -> Result<KokoroPipeline, BoxError> {
        Ok(self.load_pipeline(config)?)
    }
}

/// A loaded Kokoro model bound to one language.
pub struct KokoroPipeline {
    model: Mutex<KokoroModel>,
    voices: VoiceStore,
    vocab: Vocab,
    /// espeak-ng language every unit is phonemized in
    language: &'static str,
    speed: f32,
    espeak: EspeakConfig,
}

impl KokoroPipeline {
    pub fn language(&self) -> &'static str {
        self.language
    }

    /// All voice names, sorted.
    pub fn list_voices(&self) -> Vec<&str> {
        self.voices.list_voices()
    }

    /// Phonemize one unit and cut it into model-sized chunks.
    fn prepare(&self, unit: &str) -> Result<Vec<String>, KokoroError> {
        let phonemes = phonemize(unit, self.language, &self.espeak)?;
        let phonemes = self.vocab.retain_known(&phonemes);
        if phonemes.trim().is_empty() {
            log::warn!("No phonemes produced for text: {unit:?}");
        }
        Ok(split_phonemes(&phonemes))
    }

    fn render(
        &self,
        graphemes: &str,
        phonemes: String,
        voice: &str,
    ) -> Result<AudioSegment, KokoroError> {
        let tokens = self.vocab.encode(&phonemes);
        let style = self.voices.get_style(voice, tokens.len().saturating_sub(1))?;
        let samples = self
            .model
            .lock()
            .map_err(|_| KokoroError::LockPoisoned)?
            .infer(&tokens, &style, self.speed)?;

        Ok(AudioSegment {
            graphemes: graphemes.to_string(),
            phonemes,
            samples,
        })
    }
}

impl SpeechPipeline for KokoroPipeline {
    fn synthesize<'a>(
        &'a self,
        text: &'a str,
        voice: &'a str,
        split: SplitPattern,
    ) -> Segments<'a> {
        if let Err(e) = self.voices.ensure_voice(voice) {
            return Box::new(std::iter::once(Err(Error::Synthesis(Box::new(e)))));
        }
        if voice_lang(voice) != self.language {
            log::warn!(
                "Voice '{voice}' is tuned for {} but the pipeline speaks {}",
                voice_lang(voice),
                self.language
            );
        }

        Box::new(KokoroSegments {
            pipeline: self,
            voice,
            units: split_units(text, split),
            pending: VecDeque::new(),
            done: false,
        })
    }
}

/// Text units a request is cut into before phonemization.
///
/// Default splitting breaks on runs of newlines; blank units are dropped.
fn split_units(text: &str, split: SplitPattern) -> VecDeque<&str> {
    match split {
        SplitPattern::None => std::iter::once(text).filter(|t| !t.trim().is_empty()).collect(),
        SplitPattern::Default => text
            .split('\n')
            .map(str::trim)
            .filter(|unit| !unit.is_empty())
            .collect(),
    }
}

/// Lazily phonemizes and renders one chunk per `next()`.
struct KokoroSegments<'a> {
    pipeline: &'a KokoroPipeline,
    voice: &'a str,
    units: VecDeque<&'a str>,
    /// Chunks of the current unit still to render, with their unit text.
    pending: VecDeque<(&'a str, String)>,
    done: bool,
}

impl Iterator for KokoroSegments<'_> {
    type Item = crate::Result<AudioSegment>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if let Some((graphemes, phonemes)) = self.pending.pop_front() {
                let segment = self.pipeline.render(graphemes, phonemes, self.voice);
                if let Ok(segment) = &segment {
                    log::debug!(
                        "Rendered {:.2}s for {:?} ({:?})",
                        segment.duration_secs(),
                        segment.graphemes,
                        segment.phonemes
                    );
                }
                return Some(self.stop_on_error(segment));
            }

            let unit = self.units.pop_front()?;
            match self.pipeline.prepare(unit) {
                Ok(chunks) => self.pending.extend(chunks.into_iter().map(|c| (unit, c))),
                Err(e) => return Some(self.stop_on_error(Err(e))),
            }
        }
        None
    }
}

impl KokoroSegments<'_> {
    fn stop_on_error(
        &mut self,
        result: Result<AudioSegment, KokoroError>,
    ) -> crate::Result<AudioSegment> {
        result.map_err(|e| {
            self.done = true;
            Error::Synthesis(Box::new(e))
        })
    }
}
