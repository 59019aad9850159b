//! Declarations of the tools this plugin publishes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Name of the only tool.
pub const GENERATE_AUDIO_TOOL: &str = "generate-audio";

/// A chat-completion function tool declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDeclaration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

/// All tools, in the order they are advertised.
pub fn llm_tools() -> Vec<ToolDeclaration> {
    vec![generate_audio()]
}

fn generate_audio() -> ToolDeclaration {
    ToolDeclaration {
        kind: "function".to_string(),
        function: FunctionDeclaration {
            name: GENERATE_AUDIO_TOOL.to_string(),
            description: "Generate audio based on a text prompt.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "text": {
                        "type": "string",
                        "description": "The text to generate the audio from.",
                    },
                },
                "required": ["text"],
                "additionalProperties": false,
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{llm_tools, GENERATE_AUDIO_TOOL};
    use serde_json::json;

    #[test]
    fn declares_single_generate_audio_tool() {
        let tools = llm_tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].kind, "function");
        assert_eq!(tools[0].function.name, GENERATE_AUDIO_TOOL);
    }

    #[test]
    fn schema_requires_only_text() {
        let params = &llm_tools()[0].function.parameters;
        assert_eq!(params["required"], json!(["text"]));
        assert_eq!(params["additionalProperties"], json!(false));
        assert_eq!(params["properties"]["text"]["type"], "string");
        assert_eq!(params["properties"].as_object().map(|p| p.len()), Some(1));
    }

    #[test]
    fn serializes_in_chat_completion_shape() {
        let value = serde_json::to_value(&llm_tools()[0]).unwrap();
        assert_eq!(value["type"], "function");
        assert_eq!(value["function"]["name"], "generate-audio");
        assert_eq!(
            value["function"]["description"],
            "Generate audio based on a text prompt."
        );
    }
}
