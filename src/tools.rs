//! LLM tool capability: `generate-audio`.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{llm_tools, ToolDeclaration, GENERATE_AUDIO_TOOL};
use crate::encoder::AudioFormat;
use crate::error::{Error, Result};
use crate::pipeline::PipelineLoader;
use crate::plugin::KokoroPlugin;
use crate::{SpeechPipeline, SplitPattern};

/// Format every tool segment is encoded in.
const TOOL_AUDIO_FORMAT: AudioFormat = AudioFormat::Ogg;

/// Capability of publishing and running LLM tools.
pub trait LlmTools {
    fn llm_tools(&self) -> Vec<ToolDeclaration>;

    /// Run the tool called `name` with JSON `parameters`.
    fn call_llm_tool(&self, name: &str, parameters: &Value) -> Result<ToolResult>;
}

/// Result of a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
}

/// One typed content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Audio {
        /// Base64-encoded container bytes
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GenerateAudioParams {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateAudioParams {
    fn parse(parameters: &Value) -> Result<String> {
        if parameters.is_null() {
            return Err(Error::TextRequired);
        }
        let params: Self = serde_json::from_value(parameters.clone())
            .map_err(|e| Error::InvalidParameters(e.to_string()))?;

        match params.text {
            Some(text) if !text.is_empty() => Ok(text),
            _ => Err(Error::TextRequired),
        }
    }
}

impl<L: PipelineLoader> LlmTools for KokoroPlugin<L> {
    fn llm_tools(&self) -> Vec<ToolDeclaration> {
        llm_tools()
    }

    fn call_llm_tool(&self, name: &str, parameters: &Value) -> Result<ToolResult> {
        if name != GENERATE_AUDIO_TOOL {
            return Err(Error::UnknownTool(name.to_string()));
        }
        let text = GenerateAudioParams::parse(parameters)?;
        self.generate_audio(&text)
    }
}

impl<L: PipelineLoader> KokoroPlugin<L> {
    fn generate_audio(&self, text: &str) -> Result<ToolResult> {
        let pipeline = self.pipeline()?;
        let mut content = Vec::new();

        for (i, segment) in pipeline
            .synthesize(text, &self.config().voice, SplitPattern::Default)
            .enumerate()
        {
            let segment = segment?;
            log::debug!("{} {:?} {:?}", i, segment.graphemes, segment.phonemes);

            let bytes = self.encoder().encode_segment(&segment, TOOL_AUDIO_FORMAT)?;
            content.push(ToolContent::Audio {
                data: general_purpose::STANDARD.encode(&bytes),
                mime_type: TOOL_AUDIO_FORMAT.mime_type().to_string(),
            });
        }

        log::info!("Generated {} audio segment(s)", content.len());
        Ok(ToolResult { content })
    }
}
