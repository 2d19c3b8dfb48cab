use crate::provider::{parse_stop_sequences, GenerationOptions};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Provider identifier ("google" or "stub").
    pub provider: Option<String>,

    pub models: Models,
    pub generation: Generation,
    pub instructions: Instructions,
    pub server: Server,
    pub google: Google,
    pub paths: Paths,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Models {
    pub text: String,
    pub vision: String,
    pub image: String,
}

impl Default for Models {
    fn default() -> Self {
        Self {
            text: "gemini-1.5-flash".to_string(),
            vision: "gemini-2.0-flash".to_string(),
            image: "gemini-2.0-flash-preview-image-generation".to_string(),
        }
    }
}

/// Defaults for the settings panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Generation {
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    /// Comma separated, as typed in the settings panel.
    pub stop_sequences: String,
}

impl Default for Generation {
    fn default() -> Self {
        let o = GenerationOptions::default();
        Self {
            max_output_tokens: o.max_output_tokens,
            temperature: o.temperature,
            top_p: o.top_p,
            stop_sequences: String::new(),
        }
    }
}

impl Generation {
    pub fn options(&self) -> GenerationOptions {
        GenerationOptions {
            max_output_tokens: self.max_output_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            stop_sequences: parse_stop_sequences(&self.stop_sequences),
        }
    }
}

/// Default system instruction per tab.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Instructions {
    pub chat: String,
    pub documents: String,
    pub images: String,
}

impl Default for Instructions {
    fn default() -> Self {
        Self {
            chat: "Bạn là trợ lý AI thân thiện, trả lời bằng tiếng Việt.".to_string(),
            documents: "Bạn là trợ lý tóm tắt bằng tiếng Việt.".to_string(),
            images: "Bạn là trợ lý mô tả ảnh, tiếng Việt.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    pub bind: String,
    /// Stream chat answers fragment by fragment.
    pub streaming: bool,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7860".to_string(),
            streaming: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Google {
    pub api_key: Option<String>,
    /// OAuth access token, sent as a bearer token instead of a key.
    pub access_token: Option<String>,
    /// Override of the Generative Language API endpoint.
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Paths {
    /// Where generated images go (default: the system temp dir).
    pub artifact_dir: Option<PathBuf>,
}

impl Config {
    /// Load config if the file exists, otherwise return Ok(None).
    pub fn load_optional(path: impl AsRef<Path>) -> anyhow::Result<Option<Self>> {
        let path = path.as_ref();
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(anyhow::Error::new(e))
                    .with_context(|| format!("failed to read config: {}", path.display()))
            }
        };

        let s = String::from_utf8(bytes).context("config is not valid UTF-8")?;
        let cfg: Config = toml::from_str(&s)
            .with_context(|| format!("failed to parse TOML: {}", path.display()))?;
        cfg.generation
            .options()
            .validate()
            .with_context(|| format!("invalid [generation] in {}", path.display()))?;
        Ok(Some(cfg))
    }
}
