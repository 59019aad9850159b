//! Scripted pipeline and decoding helpers shared by unit tests.

use std::io::Cursor;
#[cfg(unix)]
use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[cfg(unix)]
use once_cell::sync::Lazy;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

#[cfg(unix)]
use crate::encoder::{EncoderConfig, SegmentEncoder};
use crate::error::{BoxError, Error};
use crate::pipeline::{PipelineConfig, PipelineLoader, SynthesisEngine};
use crate::plugin::{KokoroPlugin, PluginConfig};
use crate::{AudioSegment, Segments, SpeechPipeline, SplitPattern, SAMPLE_RATE};

/// Longest unit the fake turns into a single segment, in characters.
pub const MAX_UNIT_CHARS: usize = 32;

/// Units containing this marker fail to synthesize.
pub const FAIL_MARKER: &str = "<fail>";

/// Samples generated per input character (10 ms).
pub const SAMPLES_PER_CHAR: usize = 240;

/// Pipeline that turns each character into 10 ms of a sine tone.
///
/// Default splitting cuts on newlines; any unit longer than
/// [`MAX_UNIT_CHARS`] is further cut into several segments, even without
/// splitting.
#[derive(Debug)]
pub struct FakePipeline {
    pub config: PipelineConfig,
    /// Segments produced so far, across calls.
    pub produced: AtomicUsize,
}

impl FakePipeline {
    fn segment(&self, unit: &str) -> Result<AudioSegment, Error> {
        self.produced.fetch_add(1, Ordering::SeqCst);
        if unit.contains(FAIL_MARKER) {
            return Err(Error::Synthesis(format!("cannot voice {unit:?}").into()));
        }

        let len = unit.chars().count() * SAMPLES_PER_CHAR;
        let samples = (0..len)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                0.3 * (2.0 * std::f32::consts::PI * 220.0 * t).sin()
            })
            .collect();

        Ok(AudioSegment {
            graphemes: unit.to_string(),
            phonemes: unit.to_lowercase(),
            samples,
        })
    }
}

impl SpeechPipeline for FakePipeline {
    fn synthesize<'a>(
        &'a self,
        text: &'a str,
        _voice: &'a str,
        split: SplitPattern,
    ) -> Segments<'a> {
        let units: Vec<&str> = match split {
            SplitPattern::None => vec![text.trim()],
            SplitPattern::Default => text.split('\n').map(str::trim).collect(),
        };

        let pieces: Vec<String> = units
            .into_iter()
            .filter(|unit| !unit.is_empty())
            .flat_map(|unit| {
                let chars: Vec<char> = unit.chars().collect();
                chars
                    .chunks(MAX_UNIT_CHARS)
                    .map(|c| c.iter().collect::<String>())
                    .collect::<Vec<_>>()
            })
            .collect();

        Box::new(pieces.into_iter().map(move |piece| self.segment(&piece)))
    }
}

/// Loader that counts how often it is asked to build a pipeline.
#[derive(Debug, Default)]
pub struct FakeLoader {
    pub attempts: AtomicUsize,
    pub loads: AtomicUsize,
    /// Number of upcoming loads that fail before one succeeds.
    pub failures_left: AtomicUsize,
    pub delay: Duration,
    pub accelerators: Vec<&'static str>,
}

impl PipelineLoader for FakeLoader {
    type Pipeline = FakePipeline;

    fn accelerators(&self) -> &[&'static str] {
        &self.accelerators
    }

    fn load(&self, config: &PipelineConfig) -> Result<FakePipeline, BoxError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err("model assets missing".into());
        }

        thread::sleep(self.delay);
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(FakePipeline {
            config: config.clone(),
            produced: AtomicUsize::new(0),
        })
    }
}

pub fn fake_plugin() -> (KokoroPlugin<FakeLoader>, Arc<SynthesisEngine<FakeLoader>>) {
    let engine = Arc::new(SynthesisEngine::new(FakeLoader::default()));
    let plugin = KokoroPlugin::with_engine(Arc::clone(&engine), PluginConfig::default());
    (plugin, engine)
}

/// Stub executables standing in for ffmpeg and espeak-ng, written once per
/// test process.
#[cfg(unix)]
static TOOLS: Lazy<tempfile::TempDir> = Lazy::new(|| {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::TempDir::new().expect("temp dir should be created");
    for (name, body) in [
        ("passthrough", "#!/bin/sh\nexec cat\n"),
        ("failing", "#!/bin/sh\necho 'Unknown encoder' >&2\nexit 1\n"),
    ] {
        let path = dir.path().join(name);
        std::fs::write(&path, body).expect("script should be written");
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
    }
    dir
});

/// Executable that copies stdin to stdout and ignores its arguments.
#[cfg(unix)]
pub fn passthrough_tool() -> PathBuf {
    TOOLS.path().join("passthrough")
}

/// Executable that prints `Unknown encoder` to stderr and exits with 1.
#[cfg(unix)]
pub fn failing_tool() -> PathBuf {
    TOOLS.path().join("failing")
}

/// Plugin on the fake pipeline whose "ffmpeg" hands the WAV input back.
///
/// Every format then yields the WAV bytes of the segment.
#[cfg(unix)]
pub fn passthrough_plugin() -> (KokoroPlugin<FakeLoader>, Arc<SynthesisEngine<FakeLoader>>) {
    let (plugin, engine) = fake_plugin();
    let encoder = SegmentEncoder::new(EncoderConfig {
        ffmpeg_path: Some(passthrough_tool()),
    });
    (plugin.with_encoder(encoder), engine)
}

/// Fail a test that needs an ffmpeg encoder the host does not have.
///
/// Such tests are `#[ignore]`d and run with `cargo test -- --ignored`.
pub fn require_ffmpeg_encoder(encoder: &str) {
    assert!(
        ffmpeg_has_encoder(encoder),
        "ffmpeg with the {encoder} encoder must be on PATH"
    );
}

/// Whether the installed ffmpeg can drive `encoder` (e.g. `libvorbis`).
fn ffmpeg_has_encoder(encoder: &str) -> bool {
    match Command::new("ffmpeg").args(["-hide_banner", "-encoders"]).output() {
        Ok(output) => String::from_utf8_lossy(&output.stdout)
            .split_whitespace()
            .any(|word| word == encoder),
        Err(_) => false,
    }
}

#[derive(Debug)]
pub struct Decoded {
    pub sample_rate: u32,
    pub frames: usize,
}

/// Decode a whole container with symphonia.
pub fn decode(bytes: &[u8], extension: &str) -> Decoded {
    let source = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
    let mut hint = Hint::new();
    hint.with_extension(extension);

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .expect("container should be recognized");
    let mut format = probed.format;

    let track = format.default_track().expect("container should have a track");
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .expect("track should declare a sample rate");
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .expect("codec should be supported");

    let mut frames = 0;
    loop {
        match format.next_packet() {
            Ok(packet) => {
                if packet.track_id() != track_id {
                    continue;
                }
                let decoded = decoder.decode(&packet).expect("packet should decode");
                frames += decoded.frames();
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(e) => panic!("failed to read packet: {e}"),
        }
    }

    Decoded {
        sample_rate,
        frames,
    }
}
