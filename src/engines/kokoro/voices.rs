use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use super::model::{KokoroError, STYLE_DIM};

/// One style vector.
pub type Style = [f32; STYLE_DIM];

/// Style vectors of every voice in a Kokoro voice archive.
///
/// A voice is a table of style vectors indexed by phoneme token count, so a
/// chunk's prosody tracks its length.
pub struct VoiceStore {
    voices: HashMap<String, Vec<Style>>,
}

impl VoiceStore {
    /// Load all voices from a `.npz` archive (`voices-v1.0.bin`).
    pub fn load(path: &Path) -> Result<Self, KokoroError> {
        Self::from_reader(File::open(path)?)
    }

    /// Load all voices from any `.npz` source. Entries are `<voice>.npy`.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self, KokoroError> {
        let mut zip = zip::ZipArchive::new(reader)
            .map_err(|e| KokoroError::VoiceParse(format!("Failed to open zip archive: {e}")))?;

        let mut voices = HashMap::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut entry = zip.by_index(i).map_err(|e| {
                KokoroError::VoiceParse(format!("Failed to read zip entry {i}: {e}"))
            })?;
            if entry.is_dir() {
                continue;
            }

            let raw_name = entry.name().to_string();
            let voice_name = raw_name.trim_end_matches(".npy");
            if voice_name.is_empty() {
                continue;
            }

            let mut data = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut data)
                .map_err(|e| KokoroError::VoiceParse(format!("Failed to read {raw_name}: {e}")))?;

            voices.insert(voice_name.to_string(), parse_npy(&data, &raw_name)?);
        }

        log::info!("Loaded {} voices", voices.len());
        Ok(Self { voices })
    }

    pub fn contains(&self, voice: &str) -> bool {
        self.voices.contains_key(voice)
    }

    /// Fail with [`KokoroError::VoiceNotFound`] unless `voice` is in the archive.
    pub fn ensure_voice(&self, voice: &str) -> Result<(), KokoroError> {
        if self.contains(voice) {
            Ok(())
        } else {
            Err(KokoroError::VoiceNotFound(voice.to_string()))
        }
    }

    /// Style vector of `voice` at `idx`, clamped to the table length.
    pub fn get_style(&self, voice: &str, idx: usize) -> Result<Style, KokoroError> {
        let styles = self
            .voices
            .get(voice)
            .ok_or_else(|| KokoroError::VoiceNotFound(voice.to_string()))?;

        styles
            .get(idx.min(styles.len().saturating_sub(1)))
            .copied()
            .ok_or_else(|| KokoroError::VoiceParse(format!("{voice}: no style vectors")))
    }

    /// All voice names, sorted.
    pub fn list_voices(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.voices.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Parse a little-endian float32 `.npy` array of shape `[N, 1, 256]` or
/// `[N, 256]` into style vectors.
fn parse_npy(data: &[u8], name: &str) -> Result<Vec<Style>, KokoroError> {
    let parse_err = |msg: String| KokoroError::VoiceParse(format!("{name}: {msg}"));

    if data.len() < 10 || &data[0..6] != b"\x93NUMPY" {
        return Err(parse_err("invalid numpy magic bytes".to_string()));
    }

    // v1 stores the header length as u16 at [8..10]; v2 and v3 as u32 at [8..12].
    let (header_start, header_len) = match data[6] {
        1 => (10, u16::from_le_bytes([data[8], data[9]]) as usize),
        2 | 3 if data.len() >= 12 => (
            12,
            u32::from_le_bytes([data[8], data[9], data[10], data[11]]) as usize,
        ),
        v => return Err(parse_err(format!("unsupported npy version {v}"))),
    };

    let data_offset = header_start + header_len;
    let header = data
        .get(header_start..data_offset)
        .ok_or_else(|| parse_err(format!("header truncated (need {data_offset} bytes)")))?;
    let header = String::from_utf8_lossy(header);
    if !header.contains("'<f4'") {
        return Err(parse_err(format!("expected little-endian float32, header {header:?}")));
    }
    if header.contains("'fortran_order': True") {
        return Err(parse_err("fortran-ordered arrays are not supported".to_string()));
    }

    let float_data = &data[data_offset..];
    let style_bytes = STYLE_DIM * 4;
    if float_data.len() % style_bytes != 0 {
        return Err(parse_err(format!(
            "{} data bytes is not a whole number of {STYLE_DIM}-float style vectors",
            float_data.len()
        )));
    }

    Ok(float_data
        .chunks_exact(style_bytes)
        .map(|row| {
            let mut style = [0f32; STYLE_DIM];
            for (value, bytes) in style.iter_mut().zip(row.chunks_exact(4)) {
                *value = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            }
            style
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::{parse_npy, VoiceStore};
    use crate::engines::kokoro::model::STYLE_DIM;
    use crate::engines::kokoro::KokoroError;
    use std::collections::HashMap;

    fn npy(rows: usize, descr: &str) -> Vec<u8> {
        let mut header = format!(
            "{{'descr': '{descr}', 'fortran_order': False, 'shape': ({rows}, 1, {STYLE_DIM}), }}"
        );
        // Pad so that magic + version + len + header is a multiple of 64.
        while (10 + header.len() + 1) % 64 != 0 {
            header.push(' ');
        }
        header.push('\n');

        let mut data = b"\x93NUMPY\x01\x00".to_vec();
        data.extend_from_slice(&(header.len() as u16).to_le_bytes());
        data.extend_from_slice(header.as_bytes());
        for row in 0..rows {
            for col in 0..STYLE_DIM {
                data.extend_from_slice(&((row * 1000 + col) as f32).to_le_bytes());
            }
        }
        data
    }

    #[test]
    fn parses_style_rows() {
        let styles = parse_npy(&npy(3, "<f4"), "af_test.npy").unwrap();
        assert_eq!(styles.len(), 3);
        assert_eq!(styles[0][1], 1.0);
        assert_eq!(styles[2][0], 2000.0);
        assert_eq!(styles[2][STYLE_DIM - 1], (2000 + STYLE_DIM - 1) as f32);
    }

    #[test]
    fn rejects_non_float32_arrays() {
        assert!(matches!(
            parse_npy(&npy(1, "<f8"), "x.npy"),
            Err(KokoroError::VoiceParse(_))
        ));
        assert!(matches!(
            parse_npy(b"not numpy at all", "x.npy"),
            Err(KokoroError::VoiceParse(_))
        ));
    }

    #[test]
    fn rejects_partial_style_vectors() {
        let mut data = npy(1, "<f4");
        data.truncate(data.len() - 4);
        assert!(parse_npy(&data, "x.npy").is_err());
    }

    #[test]
    fn style_index_is_clamped() {
        let styles = parse_npy(&npy(2, "<f4"), "af_test.npy").unwrap();
        let store = VoiceStore {
            voices: HashMap::from([("af_test".to_string(), styles)]),
        };

        assert_eq!(store.get_style("af_test", 0).unwrap()[0], 0.0);
        assert_eq!(store.get_style("af_test", 500).unwrap()[0], 1000.0);
        assert!(matches!(
            store.get_style("bf_missing", 0),
            Err(KokoroError::VoiceNotFound(name)) if name == "bf_missing"
        ));
        assert_eq!(store.list_voices(), vec!["af_test"]);
    }

    #[test]
    fn unknown_voice_is_rejected_by_name() {
        let store = VoiceStore {
            voices: HashMap::from([("af_heart".to_string(), vec![[0.0; STYLE_DIM]])]),
        };

        assert!(store.contains("af_heart"));
        assert!(store.ensure_voice("af_heart").is_ok());
        assert!(!store.contains("af_nope"));
        let err = store.ensure_voice("af_nope").unwrap_err();
        assert!(matches!(err, KokoroError::VoiceNotFound(ref name) if name == "af_nope"));
        assert!(err.to_string().contains("af_nope"));
    }
}
