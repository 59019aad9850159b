use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use base64::{engine::general_purpose, Engine as _};
use kokoro_tools::{
    engines::kokoro::{create_plugin, KokoroModelParams},
    AudioFormat, LlmTools, MediaConverter, PluginConfig, ToolContent,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let params = KokoroModelParams {
        model_dir: PathBuf::from("models/kokoro"),
        ..Default::default()
    };
    let plugin = create_plugin(params, PluginConfig::default());

    let text = "Hello! This is Kokoro, a text to speech model with multilingual support.";

    for (from, to) in plugin.converters() {
        let start = Instant::now();
        let bytes = plugin.convert_media(text, from, to, None)?;
        let extension = match AudioFormat::from_mime_type(to) {
            Some(AudioFormat::Wav) => "wav",
            Some(AudioFormat::Ogg) => "ogg",
            Some(AudioFormat::Flac) => "flac",
            Some(AudioFormat::Mp3) | None => "mp3",
        };
        let path = PathBuf::from(format!("output-{}.{extension}", to.replace('/', "-")));
        fs::write(&path, &bytes)?;
        println!(
            "{to}: {} bytes in {:.2?} -> {}",
            bytes.len(),
            start.elapsed(),
            path.display()
        );
    }

    let start = Instant::now();
    let result = plugin.call_llm_tool(
        "generate-audio",
        &serde_json::json!({ "text": "First paragraph.\n\nSecond paragraph." }),
    )?;
    println!(
        "generate-audio: {} segment(s) in {:.2?}",
        result.content.len(),
        start.elapsed()
    );
    for (i, item) in result.content.iter().enumerate() {
        let ToolContent::Audio { data, mime_type } = item;
        let bytes = general_purpose::STANDARD.decode(data)?;
        let path = PathBuf::from(format!("segment-{i}.ogg"));
        fs::write(&path, &bytes)?;
        println!("  {mime_type}: {} bytes -> {}", bytes.len(), path.display());
    }

    Ok(())
}
