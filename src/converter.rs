//! Single-shot text to audio conversion.

use crate::encoder::resolve_mime_type;
use crate::error::{Error, Result};
use crate::pipeline::PipelineLoader;
use crate::plugin::KokoroPlugin;
use crate::{SpeechPipeline, SplitPattern};

/// Host-supplied conversion options. Accepted for interface compatibility;
/// no option changes the output.
pub type MediaOptions = serde_json::Map<String, serde_json::Value>;

/// (source, target) MIME pairs advertised to the host.
pub const CONVERTERS: &[(&str, &str)] = &[
    ("text/plain", "audio/ogg"),
    ("text/plain", "audio/wav"),
    ("text/plain", "audio/mpeg"),
    ("text/plain", "audio/flac"),
    ("text/plain", "audio/mp3"),
];

/// Capability of converting media from one MIME type to another.
pub trait MediaConverter {
    /// Conversion pairs this converter advertises.
    fn converters(&self) -> &'static [(&'static str, &'static str)] {
        CONVERTERS
    }

    /// Convert `data` to `to_mime_type`, returning the complete encoded bytes.
    fn convert_media(
        &self,
        data: &str,
        from_mime_type: &str,
        to_mime_type: &str,
        options: Option<&MediaOptions>,
    ) -> Result<Vec<u8>>;
}

impl<L: PipelineLoader> MediaConverter for KokoroPlugin<L> {
    fn convert_media(
        &self,
        data: &str,
        from_mime_type: &str,
        to_mime_type: &str,
        _options: Option<&MediaOptions>,
    ) -> Result<Vec<u8>> {
        let format = resolve_mime_type(to_mime_type)?;
        if !from_mime_type.starts_with("text/") {
            return Err(Error::UnsupportedSource(from_mime_type.to_string()));
        }

        let pipeline = self.pipeline()?;
        let mut segments = pipeline.synthesize(data, &self.config().voice, SplitPattern::None);

        // Only the first segment is used; the rest are never synthesized.
        let segment = segments.next().ok_or(Error::NoAudioGenerated)??;
        drop(segments);

        log::debug!(
            "Converting {:.2}s of audio to {}",
            segment.duration_secs(),
            format
        );
        self.encoder().encode_segment(&segment, format)
    }
}

#[cfg(test)]
mod tests {
    use super::{MediaConverter, CONVERTERS};
    use crate::encoder::MIME_FORMATS;
    #[cfg(unix)]
    use crate::test_support::passthrough_plugin;
    use crate::test_support::{
        decode, fake_plugin, require_ffmpeg_encoder, MAX_UNIT_CHARS, SAMPLES_PER_CHAR,
    };
    use crate::{AudioFormat, Error, ErrorKind, SAMPLE_RATE};
    use std::io::Cursor;
    use std::sync::atomic::Ordering;

    #[test]
    fn advertises_text_to_each_audio_family() {
        let (plugin, _) = fake_plugin();
        let targets: Vec<&str> = plugin.converters().iter().map(|(_, to)| *to).collect();
        assert_eq!(
            targets,
            vec!["audio/ogg", "audio/wav", "audio/mpeg", "audio/flac", "audio/mp3"]
        );
        assert!(CONVERTERS.iter().all(|(from, _)| *from == "text/plain"));
        assert!(CONVERTERS
            .iter()
            .all(|(_, to)| AudioFormat::from_mime_type(to).is_some()));
    }

    #[test]
    fn unsupported_target_fails_before_pipeline_is_built() {
        let (plugin, engine) = fake_plugin();

        let err = plugin
            .convert_media("Hello.", "text/plain", "audio/aac", None)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("audio/aac"));
        assert!(err.to_string().contains("audio/x-flac"));
        assert!(!engine.is_ready());
        assert_eq!(engine.loader().attempts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn non_text_source_is_rejected_before_pipeline_is_built() {
        let (plugin, engine) = fake_plugin();
        let err = plugin
            .convert_media("Hello.", "image/png", "audio/wav", None)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedSource(ref s) if s == "image/png"));
        assert!(!engine.is_ready());
    }

    #[test]
    fn empty_text_is_an_error_not_empty_audio() {
        let (plugin, engine) = fake_plugin();
        let err = plugin
            .convert_media("", "text/plain", "audio/wav", None)
            .unwrap_err();
        assert!(matches!(err, Error::NoAudioGenerated), "got {err:?}");
        assert_eq!(err.kind(), ErrorKind::NoOutput);
        assert!(engine.is_ready());
    }

    #[test]
    fn wav_conversion_covers_whole_sentence() {
        let (plugin, _) = fake_plugin();
        let text = "Hello world.";

        let bytes = plugin
            .convert_media(text, "text/plain", "audio/x-wav", None)
            .unwrap();

        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
        assert_eq!(reader.len() as usize, text.len() * SAMPLES_PER_CHAR);
    }

    #[test]
    fn newlines_do_not_split_converted_audio() {
        let (plugin, _) = fake_plugin();
        let text = "One.\nTwo.";

        let bytes = plugin
            .convert_media(text, "text/plain", "audio/wav", None)
            .unwrap();

        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.len() as usize, text.trim().chars().count() * SAMPLES_PER_CHAR);
    }

    #[test]
    fn only_first_segment_is_synthesized_and_returned() {
        let (plugin, engine) = fake_plugin();
        let text = "a".repeat(MAX_UNIT_CHARS * 3);

        let bytes = plugin
            .convert_media(&text, "text/plain", "audio/wav", None)
            .unwrap();

        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.len() as usize, MAX_UNIT_CHARS * SAMPLES_PER_CHAR);

        let pipeline = engine.ensure_ready("a", &Default::default()).unwrap();
        assert_eq!(pipeline.produced.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn synthesis_failure_propagates() {
        let (plugin, _) = fake_plugin();
        let err = plugin
            .convert_media("<fail>", "text/plain", "audio/wav", None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Synthesis);
    }

    #[test]
    fn pipeline_initialization_failure_propagates_then_recovers() {
        let (plugin, engine) = fake_plugin();
        engine.loader().failures_left.store(1, Ordering::SeqCst);

        let err = plugin
            .convert_media("Hi.", "text/plain", "audio/wav", None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Initialization);

        plugin
            .convert_media("Hi.", "text/plain", "audio/wav", None)
            .unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn every_supported_target_is_encoded_from_the_first_segment() {
        let (plugin, _) = passthrough_plugin();
        let text = "Hello world.";

        for (mime, _) in MIME_FORMATS {
            let bytes = plugin
                .convert_media(text, "text/plain", mime, None)
                .unwrap();
            let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
            assert_eq!(reader.spec().sample_rate, SAMPLE_RATE, "{mime}");
            assert_eq!(reader.len() as usize, text.len() * SAMPLES_PER_CHAR, "{mime}");
        }
    }

    #[test]
    #[ignore = "needs ffmpeg with libvorbis, libmp3lame and flac"]
    fn every_supported_target_decodes_as_its_container() {
        for encoder in ["libvorbis", "libmp3lame", "flac"] {
            require_ffmpeg_encoder(encoder);
        }
        let (plugin, _) = fake_plugin();

        for (mime, format) in MIME_FORMATS {
            let extension = match format {
                AudioFormat::Wav => "wav",
                AudioFormat::Ogg => "ogg",
                AudioFormat::Mp3 => "mp3",
                AudioFormat::Flac => "flac",
            };

            let bytes = plugin
                .convert_media("Hello world.", "text/plain", mime, None)
                .unwrap();
            let decoded = decode(&bytes, extension);
            assert_eq!(decoded.sample_rate, SAMPLE_RATE, "{mime}");
            assert!(decoded.frames > 0, "{mime}");
        }
    }
}
