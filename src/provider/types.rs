use futures_core::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send>>;

pub type ChunkStream = BoxStream<'static, anyhow::Result<ChatChunk>>;

/// Sampling knobs exposed in the settings panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub stop_sequences: Vec<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_output_tokens: 500,
            temperature: 0.5,
            top_p: 1.0,
            stop_sequences: Vec::new(),
        }
    }
}

impl GenerationOptions {
    pub const MAX_OUTPUT_TOKENS_LIMIT: u32 = 65_000;

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(1..=Self::MAX_OUTPUT_TOKENS_LIMIT).contains(&self.max_output_tokens) {
            anyhow::bail!(
                "max_output_tokens must be within 1..={}, got {}",
                Self::MAX_OUTPUT_TOKENS_LIMIT,
                self.max_output_tokens
            );
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            anyhow::bail!("temperature must be within 0..=2, got {}", self.temperature);
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            anyhow::bail!("top_p must be within 0..=1, got {}", self.top_p);
        }
        Ok(())
    }
}

/// Split the comma separated stop field from the settings panel.
pub fn parse_stop_sequences(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    Inline { mime_type: String, data: Vec<u8> },
}

impl Part {
    pub fn text(s: impl Into<String>) -> Self {
        Part::Text(s.into())
    }

    pub fn inline(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Part::Inline {
            mime_type: mime_type.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Text,
    Image,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub system_instruction: Option<String>,
    pub options: GenerationOptions,
    pub parts: Vec<Part>,

    /// Empty means the service default (text only).
    pub response_modalities: Vec<Modality>,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, options: GenerationOptions) -> Self {
        Self {
            model: model.into(),
            system_instruction: None,
            options,
            parts: Vec::new(),
            response_modalities: Vec::new(),
        }
    }

    pub fn with_system_instruction(mut self, instruction: Option<String>) -> Self {
        self.system_instruction = instruction.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn with_part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    pub fn with_modalities(mut self, modalities: &[Modality]) -> Self {
        self.response_modalities = modalities.to_vec();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePart {
    Text(String),
    Image { mime_type: String, data: Vec<u8> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateResponse {
    pub parts: Vec<ResponsePart>,
}

impl GenerateResponse {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![ResponsePart::Text(text.into())],
        }
    }

    /// All text parts, concatenated in order.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ResponsePart::Text(t) => Some(t.as_str()),
                ResponsePart::Image { .. } => None,
            })
            .collect()
    }

    /// The last text part alone; image answers caption with this.
    pub fn last_text(&self) -> Option<&str> {
        self.parts.iter().rev().find_map(|p| match p {
            ResponsePart::Text(t) => Some(t.as_str()),
            ResponsePart::Image { .. } => None,
        })
    }

    /// The last inline image, if the model returned any.
    pub fn image(&self) -> Option<(&str, &[u8])> {
        self.parts.iter().rev().find_map(|p| match p {
            ResponsePart::Image { mime_type, data } => Some((mime_type.as_str(), data.as_slice())),
            ResponsePart::Text(_) => None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ChatChunk {
    pub text: String,
}

/// Provider interface: one blocking call shape and one streaming call shape.
pub trait Provider {
    fn name(&self) -> &'static str;

    /// Issue a single request and wait for the whole response.
    fn generate(&self, req: GenerateRequest) -> BoxFuture<GenerateResponse>;

    /// Start streaming a text response.
    fn stream_chat(&self, req: GenerateRequest) -> BoxFuture<ChunkStream>;
}

pub type SharedProvider = std::sync::Arc<dyn Provider + Send + Sync>;
