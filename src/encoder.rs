//! Raw samples to container bytes.
//!
//! WAV is written in memory with `hound`. OGG (Vorbis), MP3 and FLAC are
//! produced by piping that WAV through an `ffmpeg` child process with
//! bit-exact flags, so the same samples always encode to the same bytes for a
//! given ffmpeg build.

use std::fmt;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::{AudioSegment, SAMPLE_RATE};

/// Container formats a segment can be encoded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioFormat {
    Wav,
    Ogg,
    Mp3,
    Flac,
}

/// Accepted target MIME types and the container each one maps to.
///
/// Order is the order reported back in "unsupported format" errors.
pub const MIME_FORMATS: &[(&str, AudioFormat)] = &[
    ("audio/wav", AudioFormat::Wav),
    ("audio/x-wav", AudioFormat::Wav),
    ("audio/wave", AudioFormat::Wav),
    ("audio/ogg", AudioFormat::Ogg),
    ("audio/mpeg", AudioFormat::Mp3),
    ("audio/mp3", AudioFormat::Mp3),
    ("audio/flac", AudioFormat::Flac),
    ("audio/x-flac", AudioFormat::Flac),
];

impl AudioFormat {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Wav => "WAV",
            Self::Ogg => "OGG",
            Self::Mp3 => "MP3",
            Self::Flac => "FLAC",
        }
    }

    /// Canonical MIME type for this container.
    pub const fn mime_type(&self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Ogg => "audio/ogg",
            Self::Mp3 => "audio/mpeg",
            Self::Flac => "audio/flac",
        }
    }

    pub fn from_mime_type(mime: &str) -> Option<Self> {
        MIME_FORMATS
            .iter()
            .find(|(known, _)| *known == mime)
            .map(|(_, format)| *format)
    }

    /// ffmpeg codec and muxer names, `None` for formats written in-process.
    const fn ffmpeg_codec(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::Wav => None,
            Self::Ogg => Some(("libvorbis", "ogg")),
            Self::Mp3 => Some(("libmp3lame", "mp3")),
            Self::Flac => Some(("flac", "flac")),
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Every accepted target MIME type, in table order.
pub fn supported_mime_types() -> impl Iterator<Item = &'static str> {
    MIME_FORMATS.iter().map(|(mime, _)| *mime)
}

/// Look up a target MIME type, failing with the list of accepted ones.
pub fn resolve_mime_type(mime: &str) -> Result<AudioFormat> {
    AudioFormat::from_mime_type(mime).ok_or_else(|| Error::UnsupportedFormat {
        requested: mime.to_string(),
        supported: supported_mime_types().collect::<Vec<_>>().join(", "),
    })
}

/// Encoder settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// ffmpeg binary. `None` resolves `ffmpeg` from PATH.
    pub ffmpeg_path: Option<PathBuf>,
}

/// Turns raw segments into container bytes.
#[derive(Debug, Clone, Default)]
pub struct SegmentEncoder {
    config: EncoderConfig,
}

impl SegmentEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Encode a segment at the pipeline sample rate.
    pub fn encode_segment(&self, segment: &AudioSegment, format: AudioFormat) -> Result<Vec<u8>> {
        self.encode(&segment.samples, SAMPLE_RATE, format)
    }

    /// Encode mono samples into `format`.
    pub fn encode(
        &self,
        samples: &[f32],
        sample_rate: u32,
        format: AudioFormat,
    ) -> Result<Vec<u8>> {
        let wav = write_wav(samples, sample_rate)?;
        let bytes = match format.ffmpeg_codec() {
            None => wav,
            Some((codec, muxer)) => self.transcode(wav, codec, muxer)?,
        };

        log::debug!(
            "Encoded {} samples as {} ({} bytes)",
            samples.len(),
            format,
            bytes.len()
        );
        Ok(bytes)
    }

    fn ffmpeg_command(&self) -> Command {
        match &self.config.ffmpeg_path {
            Some(path) => Command::new(path),
            None => Command::new("ffmpeg"),
        }
    }

    fn transcode(&self, wav: Vec<u8>, codec: &str, muxer: &str) -> Result<Vec<u8>> {
        let mut child = self
            .ffmpeg_command()
            .args(["-hide_banner", "-loglevel", "error"])
            .args(["-f", "wav", "-i", "pipe:0"])
            .args(["-map_metadata", "-1", "-fflags", "+bitexact", "-flags:a", "+bitexact"])
            .args(["-c:a", codec])
            .args(codec_options(codec))
            .args(["-f", muxer, "pipe:1"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::EncoderNotFound
                } else {
                    Error::Encoding(format!("Failed to spawn ffmpeg: {e}"))
                }
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Encoding("ffmpeg stdin unavailable".to_string()))?;
        // ffmpeg starts emitting output before it has read all input.
        let feeder = thread::spawn(move || stdin.write_all(&wav));

        let output = child
            .wait_with_output()
            .map_err(|e| Error::Encoding(format!("Failed to wait for ffmpeg: {e}")))?;
        let fed = feeder
            .join()
            .map_err(|_| Error::Encoding("ffmpeg stdin writer panicked".to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Encoding(format!(
                "ffmpeg exited with code {:?}: {}",
                output.status.code(),
                stderr.trim()
            )));
        }
        fed.map_err(|e| Error::Encoding(format!("Failed to write to ffmpeg stdin: {e}")))?;

        if output.stdout.is_empty() {
            return Err(Error::Encoding("ffmpeg produced empty output".to_string()));
        }
        Ok(output.stdout)
    }
}

fn codec_options(codec: &str) -> &'static [&'static str] {
    match codec {
        "libmp3lame" => &["-q:a", "2"],
        "flac" => &["-compression_level", "5"],
        _ => &[],
    }
}

/// Write mono samples as a 16-bit PCM WAV in memory.
pub fn write_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(to_pcm16(sample))?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}
