//! Lazily constructed, process-wide synthesis pipeline.
//!
//! A [`SynthesisEngine`] owns at most one pipeline. The first caller of
//! [`SynthesisEngine::ensure_ready`] builds it through a [`PipelineLoader`];
//! every later caller gets the same [`Arc`] back, whatever language or device
//! it asks for. Construction is serialized, so racing first callers still
//! build exactly one pipeline. A failed construction leaves the engine empty
//! and the next call tries again.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::{BoxError, Error, Result};
use crate::SpeechPipeline;

/// Known (OS, architecture) pairs with a preferred accelerator.
const PLATFORM_ACCELERATORS: &[(&str, &str, &str)] = &[("macos", "aarch64", "coreml")];

/// Which compute device a pipeline should run on.
///
/// Serialized as a plain string: `"auto"`, `"cpu"`, or any other value for a
/// named device.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceHint {
    /// Use the platform accelerator when the backend supports it, else let the
    /// backend choose.
    #[default]
    Auto,
    /// Never request an explicit device.
    Cpu,
    /// Request this device identifier verbatim.
    Named(String),
}

impl DeviceHint {
    /// Resolve against the current host.
    pub fn resolve(&self, supported: &[&str]) -> Option<String> {
        self.resolve_for(std::env::consts::OS, std::env::consts::ARCH, supported)
    }

    /// Resolve against an explicit host description.
    ///
    /// `None` means no explicit device is requested.
    pub fn resolve_for(&self, os: &str, arch: &str, supported: &[&str]) -> Option<String> {
        match self {
            Self::Auto => platform_accelerator(os, arch)
                .filter(|device| supported.contains(device))
                .map(str::to_string),
            Self::Cpu => None,
            Self::Named(name) => Some(name.clone()),
        }
    }
}

impl From<String> for DeviceHint {
    fn from(value: String) -> Self {
        match value.as_str() {
            "" | "auto" => Self::Auto,
            "cpu" => Self::Cpu,
            _ => Self::Named(value),
        }
    }
}

impl From<&str> for DeviceHint {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<DeviceHint> for String {
    fn from(hint: DeviceHint) -> Self {
        match hint {
            DeviceHint::Auto => "auto".to_string(),
            DeviceHint::Cpu => "cpu".to_string(),
            DeviceHint::Named(name) => name,
        }
    }
}

/// Accelerator identifier for a host, if the pair is a known one.
pub fn platform_accelerator(os: &str, arch: &str) -> Option<&'static str> {
    PLATFORM_ACCELERATORS
        .iter()
        .find(|(known_os, known_arch, _)| *known_os == os && *known_arch == arch)
        .map(|(_, _, device)| *device)
}

/// What a loader receives when asked to build a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Language code the pipeline is bound to (e.g. `"a"` for American English).
    pub lang_code: String,
    /// Resolved device, `None` to let the backend choose.
    pub device: Option<String>,
}

/// Builds pipelines for a [`SynthesisEngine`].
pub trait PipelineLoader: Send + Sync {
    type Pipeline: SpeechPipeline;

    /// Accelerator identifiers this backend can run on.
    fn accelerators(&self) -> &[&'static str] {
        &[]
    }

    /// Construct a pipeline. Expensive: loads model weights.
    fn load(&self, config: &PipelineConfig) -> std::result::Result<Self::Pipeline, BoxError>;
}

/// Owner of the single pipeline instance.
pub struct SynthesisEngine<L: PipelineLoader> {
    loader: L,
    pipeline: OnceCell<Arc<L::Pipeline>>,
}

impl<L: PipelineLoader> SynthesisEngine<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            pipeline: OnceCell::new(),
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Whether a pipeline has been constructed.
    pub fn is_ready(&self) -> bool {
        self.pipeline.get().is_some()
    }

    /// Get the pipeline, constructing it on first use.
    ///
    /// `lang_code` and `device` only matter for the call that constructs the
    /// pipeline; afterwards they are ignored.
    pub fn ensure_ready(&self, lang_code: &str, device: &DeviceHint) -> Result<Arc<L::Pipeline>> {
        self.pipeline
            .get_or_try_init(|| {
                let config = PipelineConfig {
                    lang_code: lang_code.to_string(),
                    device: device.resolve(self.loader.accelerators()),
                };
                log::info!(
                    "Initializing synthesis pipeline: lang_code='{}', device={:?}",
                    config.lang_code,
                    config.device
                );

                let start = Instant::now();
                let pipeline = self.loader.load(&config).map_err(Error::Initialization)?;
                log::info!("Synthesis pipeline ready in {:.2?}", start.elapsed());
                Ok(Arc::new(pipeline))
            })
            .map(Arc::clone)
    }
}

impl<L: PipelineLoader> fmt::Debug for SynthesisEngine<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthesisEngine")
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}
