use std::borrow::Cow;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use serde::{Deserialize, Serialize};

use super::model::KokoroError;

/// Location of the espeak-ng binary and its data directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EspeakConfig {
    /// espeak-ng binary. `None` resolves `espeak-ng` from PATH.
    pub bin_path: Option<PathBuf>,
    /// Directory containing `espeak-ng-data`. `None` uses the compiled-in default.
    pub data_path: Option<PathBuf>,
}

impl EspeakConfig {
    fn command(&self) -> Command {
        let mut cmd = match &self.bin_path {
            Some(path) => Command::new(path),
            None => Command::new("espeak-ng"),
        };
        if let Some(data) = &self.data_path {
            cmd.arg(format!("--path={}", data.display()));
        }
        cmd
    }
}

/// espeak-ng language for a Kokoro language code.
///
/// Accepts the one-letter codes (`"a"`, `"b"`, ...) and their long aliases.
pub fn espeak_language(lang_code: &str) -> Option<&'static str> {
    let lang = match lang_code.to_ascii_lowercase().as_str() {
        "a" | "en-us" => "en-us",
        "b" | "en-gb" => "en-gb",
        "e" | "es" => "es",
        "f" | "fr" | "fr-fr" => "fr",
        "h" | "hi" => "hi",
        "i" | "it" => "it",
        "j" | "ja" => "ja",
        "p" | "pt-br" => "pt-br",
        "z" | "zh" | "cmn" => "cmn",
        _ => return None,
    };
    Some(lang)
}

/// espeak-ng language implied by a voice name prefix (`af_heart` -> `en-us`).
pub fn voice_lang(voice: &str) -> &'static str {
    let prefix = voice.get(..1).unwrap_or_default();
    espeak_language(prefix).unwrap_or("en-us")
}

/// Convert text to a phoneme string via espeak-ng.
///
/// Boundary punctuation in `text` is carried through verbatim between the
/// phonemized runs; everything between punctuation goes to espeak-ng in one
/// batch.
pub fn phonemize(text: &str, lang: &str, espeak: &EspeakConfig) -> Result<String, KokoroError> {
    let parts = split_text_parts(text);
    if parts.is_empty() {
        return Ok(String::new());
    }

    let text_segments: Vec<&str> = parts
        .iter()
        .filter_map(|part| match part {
            TextPart::Text(segment) => Some(segment.as_str()),
            TextPart::Punct(_) => None,
        })
        .collect();

    let segment_ipa = if text_segments.is_empty() {
        Vec::new()
    } else {
        phonemize_segments_batch(&text_segments, lang, espeak)?
    };

    let mut phonemes = String::new();
    let mut segment_index = 0usize;
    for part in parts {
        match part {
            TextPart::Text(_) => {
                if let Some(ipa) = segment_ipa.get(segment_index) {
                    if ends_with_pause(&phonemes) {
                        phonemes.push(' ');
                    }
                    phonemes.push_str(ipa);
                }
                segment_index += 1;
            }
            TextPart::Punct(ch) => phonemes.push(ch),
        }
    }

    Ok(phonemes)
}

fn ends_with_pause(phonemes: &str) -> bool {
    matches!(
        phonemes.chars().next_back(),
        Some('.' | '!' | '?' | ',' | ';' | ':' | '—' | '…')
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TextPart {
    Text(String),
    Punct(char),
}

fn split_text_parts(text: &str) -> Vec<TextPart> {
    let mut parts = Vec::new();
    let mut current = String::new();

    for (idx, ch) in text.char_indices() {
        let ch_len = ch.len_utf8();
        if let Some(punct) = map_boundary_punctuation(ch) {
            if !is_numeric_connector_between_digits(text, idx, ch_len, ch) {
                flush_text_part(&mut parts, &mut current);
                parts.push(TextPart::Punct(punct));
                continue;
            }
        }

        if ch.is_whitespace() {
            if !current.is_empty() && !current.ends_with(' ') {
                current.push(' ');
            }
            continue;
        }

        current.push(ch);
    }

    flush_text_part(&mut parts, &mut current);
    parts
}

fn flush_text_part(parts: &mut Vec<TextPart>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        parts.push(TextPart::Text(trimmed.to_string()));
    }
    current.clear();
}

fn map_boundary_punctuation(ch: char) -> Option<char> {
    match ch {
        '.' | '!' | '?' | ',' | ';' | ':' | '—' | '…' | '"' | '(' | ')' | '\u{201c}'
        | '\u{201d}' => Some(ch),
        '\n' | '\r' => Some('.'),
        _ => None,
    }
}

fn is_numeric_connector_between_digits(text: &str, idx: usize, ch_len: usize, ch: char) -> bool {
    if !matches!(ch, '.' | ',') {
        return false;
    }

    let prev = text[..idx].chars().next_back();
    let next = text[idx + ch_len..].chars().next();

    matches!(
        (prev, next),
        (Some(left), Some(right)) if left.is_ascii_digit() && right.is_ascii_digit()
    )
}

fn phonemize_segments_batch(
    segments: &[&str],
    lang: &str,
    espeak: &EspeakConfig,
) -> Result<Vec<String>, KokoroError> {
    let output = run_espeak(&segments.join("\n"), lang, espeak)?;
    let lines: Vec<&str> = output.lines().collect();

    // One output line per input line is expected; otherwise go segment by segment.
    if lines.len() != segments.len() {
        log::debug!(
            "espeak-ng returned {} lines for {} segments, phonemizing individually",
            lines.len(),
            segments.len()
        );
        return segments
            .iter()
            .map(|segment| Ok(clean_ipa(&run_espeak(segment, lang, espeak)?)))
            .collect();
    }

    Ok(lines.into_iter().map(clean_ipa).collect())
}

fn run_espeak(input: &str, lang: &str, espeak: &EspeakConfig) -> Result<String, KokoroError> {
    let mut child = espeak
        .command()
        .args(["--ipa", "--stdin", "-q", "-v", lang])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KokoroError::EspeakNotFound
            } else {
                KokoroError::Io(e)
            }
        })?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| KokoroError::PhonemizerFailed("espeak-ng stdin unavailable".to_string()))?;
    // espeak-ng under-processes a final line that lacks its terminator.
    let stdin_payload = canonicalize_espeak_stdin_payload(input).into_owned();
    // espeak-ng emits output before it has read all input.
    let feeder = thread::spawn(move || stdin.write_all(stdin_payload.as_bytes()));

    let output = child.wait_with_output().map_err(KokoroError::Io)?;
    let fed = feeder.join().map_err(|_| {
        KokoroError::PhonemizerFailed("espeak-ng stdin writer panicked".to_string())
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(KokoroError::PhonemizerFailed(format!(
            "espeak-ng exited with code {:?}: {stderr}",
            output.status.code()
        )));
    }
    fed.map_err(KokoroError::Io)?;

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn canonicalize_espeak_stdin_payload(input: &str) -> Cow<'_, str> {
    if input.ends_with('\n') {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(format!("{input}\n"))
    }
}

/// Join espeak-ng output lines into one phoneme run, dropping tie markers.
fn clean_ipa(ipa: &str) -> String {
    ipa.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .replace('_', "")
}
