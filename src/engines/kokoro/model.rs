use std::path::{Path, PathBuf};

use ndarray::Array2;
use ort::execution_providers::{CPUExecutionProvider, ExecutionProviderDispatch};
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;

/// Maximum number of phoneme tokens per chunk (before padding).
pub const MAX_PHONEME_LEN: usize = 510;

/// Style vector dimension for Kokoro.
pub const STYLE_DIM: usize = 256;

/// Phoneme symbols a chunk prefers to end on.
const CHUNK_BOUNDARIES: &[char] = &[';', ':', ',', '.', '!', '?'];

#[derive(thiserror::Error, Debug)]
pub enum KokoroError {
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error(
        "espeak-ng not found. Install: Linux: `sudo apt-get install espeak-ng`, \
         macOS: `brew install espeak-ng`, Windows: https://espeak-ng.org/download"
    )]
    EspeakNotFound,
    #[error("Phonemization failed: {0}")]
    PhonemizerFailed(String),
    #[error("Voice '{0}' not found in the voice archive.")]
    VoiceNotFound(String),
    #[error("Unsupported language code '{0}'. Use one of a, b, e, f, h, i, j, p, z.")]
    UnsupportedLanguage(String),
    #[error("Unsupported device '{0}'. Build with the matching execution provider feature.")]
    UnsupportedDevice(String),
    #[error("Invalid config.json: {0}")]
    Config(String),
    #[error("Failed to parse voice file: {0}")]
    VoiceParse(String),
    #[error("Model lock poisoned by an earlier panic")]
    LockPoisoned,
}

/// ONNX session of a loaded Kokoro model.
pub struct KokoroModel {
    session: Session,
    /// Detected input name: "input_ids" or "tokens"
    tokens_input_name: String,
    /// True if the speed input expects int32, false for float32
    speed_is_int32: bool,
}

impl KokoroModel {
    /// Load the ONNX model found in `model_dir` onto `device`.
    ///
    /// Prefers `kokoro-quant-convinteger.onnx`, then the first `.onnx` file.
    pub fn load(
        model_dir: &Path,
        device: Option<&str>,
        num_threads: Option<usize>,
        optimized_cache_path: Option<&Path>,
    ) -> Result<Self, KokoroError> {
        let onnx_path = find_onnx_file(model_dir)?;
        log::info!("Loading Kokoro model from {}", onnx_path.display());

        let providers = execution_providers(device)?;
        let session = init_session(&onnx_path, providers, num_threads, optimized_cache_path)?;

        let tokens_input_name = detect_tokens_input(&session);
        let speed_is_int32 = detect_speed_type(&session);
        log::info!(
            "Detected: tokens_input='{}', speed_is_int32={}",
            tokens_input_name,
            speed_is_int32
        );

        Ok(Self {
            session,
            tokens_input_name,
            speed_is_int32,
        })
    }

    /// Run inference on one chunk of phoneme token IDs.
    pub fn infer(
        &mut self,
        tokens: &[i64],
        style: &[f32; STYLE_DIM],
        speed: f32,
    ) -> Result<Vec<f32>, KokoroError> {
        let seq_len = tokens.len() + 2; // +2 for padding tokens

        // [[0, t1..tN, 0]]
        let mut padded = vec![0i64; seq_len];
        padded[1..seq_len - 1].copy_from_slice(tokens);
        let tokens_arr = Array2::from_shape_vec((1, seq_len), padded)?;

        let style_view = ndarray::ArrayView2::from_shape((1, STYLE_DIM), style.as_slice())?;

        let output = if self.speed_is_int32 {
            let speed_arr = ndarray::arr1(&[speed.round() as i32]);
            let inputs = inputs![
                self.tokens_input_name.as_str() => TensorRef::from_array_view(tokens_arr.view())?,
                "style" => TensorRef::from_array_view(style_view)?,
                "speed" => TensorRef::from_array_view(speed_arr.view())?,
            ];
            self.session.run(inputs)?
        } else {
            let speed_arr = ndarray::arr1(&[speed]);
            let inputs = inputs![
                self.tokens_input_name.as_str() => TensorRef::from_array_view(tokens_arr.view())?,
                "style" => TensorRef::from_array_view(style_view)?,
                "speed" => TensorRef::from_array_view(speed_arr.view())?,
            ];
            self.session.run(inputs)?
        };

        let (_, waveform) = output
            .iter()
            .next()
            .ok_or_else(|| KokoroError::Ort(ort::Error::new("No output from model")))?;
        let waveform = waveform.try_extract_array::<f32>()?;

        Ok(waveform.iter().copied().collect())
    }
}

/// Execution providers for a resolved device.
fn execution_providers(
    device: Option<&str>,
) -> Result<Vec<ExecutionProviderDispatch>, KokoroError> {
    match device {
        None => Ok(vec![CPUExecutionProvider::default().build()]),
        #[cfg(feature = "coreml")]
        Some("coreml") => Ok(vec![
            ort::execution_providers::CoreMLExecutionProvider::default().build(),
            CPUExecutionProvider::default().build(),
        ]),
        Some(other) => Err(KokoroError::UnsupportedDevice(other.to_string())),
    }
}

fn find_onnx_file(model_dir: &Path) -> Result<PathBuf, KokoroError> {
    let preferred = model_dir.join("kokoro-quant-convinteger.onnx");
    if preferred.exists() {
        return Ok(preferred);
    }

    for entry in std::fs::read_dir(model_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("onnx") {
            log::info!("Using ONNX file: {}", path.display());
            return Ok(path);
        }
    }

    Err(KokoroError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("No .onnx file found in {}", model_dir.display()),
    )))
}

/// Build the ONNX session, optionally caching the optimized graph on disk.
///
/// With a cache path, the first load runs Level3 optimization and writes the
/// result there; later loads read it back with optimization disabled.
fn init_session(
    onnx_path: &Path,
    providers: Vec<ExecutionProviderDispatch>,
    num_threads: Option<usize>,
    optimized_cache_path: Option<&Path>,
) -> Result<Session, KokoroError> {
    let (load_path, opt_level, write_cache) = match optimized_cache_path {
        Some(cache) if cache.exists() => {
            log::info!("Loading pre-optimized Kokoro graph from {}", cache.display());
            (cache, GraphOptimizationLevel::Disable, None)
        }
        Some(cache) => {
            log::info!(
                "First load: running Level3 optimization; saving graph to {}",
                cache.display()
            );
            (onnx_path, GraphOptimizationLevel::Level3, Some(cache))
        }
        None => (onnx_path, GraphOptimizationLevel::Level3, None),
    };

    let mut builder = Session::builder()?
        .with_optimization_level(opt_level)?
        .with_execution_providers(providers)?
        .with_parallel_execution(true)?;

    if let Some(cache) = write_cache {
        builder = builder.with_optimized_model_path(cache)?;
    }

    if let Some(threads) = num_threads {
        builder = builder
            .with_intra_threads(threads)?
            .with_inter_threads(threads)?;
    }

    Ok(builder.commit_from_file(load_path)?)
}

fn detect_tokens_input(session: &Session) -> String {
    session
        .inputs()
        .iter()
        .map(|input| input.name())
        .find(|name| *name == "input_ids" || *name == "tokens")
        .unwrap_or("input_ids")
        .to_string()
}

fn detect_speed_type(session: &Session) -> bool {
    session
        .inputs()
        .iter()
        .find(|input| input.name() == "speed")
        .map(|input| {
            let type_str = format!("{:?}", input.dtype());
            type_str.contains("Int32") || type_str.contains("int32")
        })
        // Modern Kokoro exports use int32
        .unwrap_or(true)
}

/// Split a phoneme string into chunks of at most `MAX_PHONEME_LEN` symbols.
///
/// A chunk ends after the last punctuation mark that fits, else after the
/// last space, else at the hard limit. Whitespace at chunk edges is dropped.
pub fn split_phonemes(phonemes: &str) -> Vec<String> {
    split_phonemes_at(phonemes, MAX_PHONEME_LEN)
}

fn split_phonemes_at(phonemes: &str, max_len: usize) -> Vec<String> {
    let symbols: Vec<char> = phonemes.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < symbols.len() {
        let end = (start + max_len).min(symbols.len());
        let split = if end == symbols.len() {
            end
        } else {
            let window = &symbols[start..end];
            window
                .iter()
                .rposition(|ch| CHUNK_BOUNDARIES.contains(ch))
                .or_else(|| window.iter().rposition(|ch| *ch == ' '))
                .map(|i| start + i + 1)
                .unwrap_or(end)
        };

        let chunk: String = symbols[start..split].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        start = split;
    }

    chunks
}
