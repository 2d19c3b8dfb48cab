//! One pipeline for every tab of the UI.
//!
//! Chat turns go through the streaming protocol when the pipeline supports
//! streaming, otherwise through a single call. Documents and images are
//! always one call each. Every failure ends up in the log as an error turn;
//! nothing here returns a remote failure to the caller.

use crate::documents::{self, Extracted};
use crate::images;
use crate::provider::{GenerateRequest, GenerationOptions, Modality, Part, SharedProvider};
use crate::session::{ConversationLog, Prompt, Response, SessionError};
use crate::stream::{self, Observer, StreamOutcome};
use anyhow::Context;
use std::path::{Path, PathBuf};

pub const DOCUMENT_MARKER: &str = "📄 Tóm tắt:";
pub const DOCUMENT_ERROR_MARKER: &str = "❌ Lỗi tóm tắt:";
const SUMMARIZE_INSTRUCTION: &str = "Hãy tóm tắt tài liệu này";

pub const IMAGE_MARKER: &str = "🖼️";
pub const IMAGE_ERROR_MARKER: &str = "❌";
const DESCRIBE_INSTRUCTION: &str = "Mô tả chi tiết hình ảnh trên bằng tiếng Việt.";

pub const GENERATE_PROMPT_MARKER: &str = "🎨 Prompt:";
pub const GENERATE_IMAGE_MARKER: &str = "🖼️ Ảnh:";
pub const GENERATE_TEXT_MARKER: &str = "📝 Mô tả:";
pub const GENERATE_ERROR_MARKER: &str = "❌ Lỗi tạo/chỉnh ảnh:";

/// Model identifiers per kind of request.
#[derive(Debug, Clone)]
pub struct ModelSet {
    pub text: String,
    pub vision: String,
    pub image: String,
}

/// Per-request knobs coming from the settings panel and the tab.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnSettings {
    pub options: GenerationOptions,
    pub system_instruction: Option<String>,
}

#[derive(Clone)]
pub struct Pipeline {
    provider: SharedProvider,
    models: ModelSet,
    artifact_dir: PathBuf,
    streaming: bool,
}

impl Pipeline {
    pub fn new(provider: SharedProvider, models: ModelSet, artifact_dir: PathBuf, streaming: bool) -> Self {
        Self {
            provider,
            models,
            artifact_dir,
            streaming,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    fn request(&self, model: &str, settings: &TurnSettings) -> GenerateRequest {
        GenerateRequest::new(model, settings.options.clone())
            .with_system_instruction(settings.system_instruction.clone())
    }

    /// One chat turn. The observer sees the log after every change.
    pub async fn chat<O>(
        &self,
        log: &mut ConversationLog,
        message: &str,
        settings: &TurnSettings,
        observer: &mut O,
    ) -> Result<StreamOutcome, SessionError>
    where
        O: Observer + ?Sized,
    {
        let req = self
            .request(&self.models.text, settings)
            .with_part(Part::text(message));
        let prompt = Prompt::text(message);

        if self.streaming {
            return stream::run_streaming_turn(log, self.provider.as_ref(), prompt, req, observer).await;
        }

        let outcome = match self.provider.generate(req).await {
            Ok(resp) => {
                let text = resp.text();
                log.append_complete(prompt, Response::text(text.clone()));
                StreamOutcome::Completed(text)
            }
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "chat request failed");
                let marker = stream::chat_error_marker(&e);
                log.append_complete(prompt, Response::error(marker.clone()));
                StreamOutcome::Failed(marker)
            }
        };
        observer.emit(log);
        Ok(outcome)
    }

    /// Summarize a document. PDFs go to the vision model as raw bytes;
    /// everything else is reduced to text first.
    pub async fn summarize_document(&self, log: &mut ConversationLog, path: &Path, settings: &TurnSettings) {
        match self.try_summarize(path, settings).await {
            Ok(summary) => log.append_complete(Prompt::marker(DOCUMENT_MARKER), Response::text(summary)),
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), path = %path.display(), "document summary failed");
                log.append_complete(
                    Prompt::marker(DOCUMENT_ERROR_MARKER),
                    Response::error(format!("{e:#}")),
                );
            }
        }
    }

    async fn try_summarize(&self, path: &Path, settings: &TurnSettings) -> anyhow::Result<String> {
        let req = match documents::extract(path)? {
            Extracted::Binary { mime_type, data } => self
                .request(&self.models.vision, settings)
                .with_part(Part::inline(mime_type, data)),
            Extracted::Text(text) => self
                .request(&self.models.text, settings)
                .with_part(Part::text(text)),
        }
        .with_part(Part::text(SUMMARIZE_INSTRUCTION));

        let resp = self.provider.generate(req).await?;
        Ok(resp.text())
    }

    /// Describe an uploaded image (any format the decoder knows).
    pub async fn describe_image(&self, log: &mut ConversationLog, image: &[u8], settings: &TurnSettings) {
        match self.try_describe(image, settings).await {
            Ok(text) => log.append_complete(Prompt::marker(IMAGE_MARKER), Response::text(text)),
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "image description failed");
                log.append_complete(
                    Prompt::marker(IMAGE_ERROR_MARKER),
                    Response::error(format!("Lỗi mô tả ảnh: {e:#}")),
                );
            }
        }
    }

    async fn try_describe(&self, image: &[u8], settings: &TurnSettings) -> anyhow::Result<String> {
        let jpeg = images::to_jpeg(image)?;
        let req = self
            .request(&self.models.vision, settings)
            .with_part(Part::inline("image/jpeg", jpeg))
            .with_part(Part::text(DESCRIBE_INSTRUCTION));
        Ok(self.provider.generate(req).await?.text())
    }

    /// Generate a new image from `prompt`, or edit `source` when given.
    ///
    /// On success the log gains the prompt turn, then the image turn and the
    /// text turn for whichever of the two the model returned.
    pub async fn generate_image(
        &self,
        log: &mut ConversationLog,
        prompt: &str,
        source: Option<&[u8]>,
        options: &GenerationOptions,
    ) {
        match self.try_generate(prompt, source, options).await {
            Ok((artifact, text)) => {
                log.append_complete(Prompt::marker(GENERATE_PROMPT_MARKER), Response::text(prompt));
                if let Some(artifact) = artifact {
                    log.append_complete(Prompt::marker(GENERATE_IMAGE_MARKER), Response::Image(artifact));
                }
                if !text.is_empty() {
                    log.append_complete(Prompt::marker(GENERATE_TEXT_MARKER), Response::text(text));
                }
            }
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "image generation failed");
                log.append_complete(
                    Prompt::marker(GENERATE_ERROR_MARKER),
                    Response::error(format!("{e:#}")),
                );
            }
        }
    }

    async fn try_generate(
        &self,
        prompt: &str,
        source: Option<&[u8]>,
        options: &GenerationOptions,
    ) -> anyhow::Result<(Option<crate::session::ImageArtifact>, String)> {
        // The image model rejects system instructions.
        let mut req = GenerateRequest::new(&self.models.image, options.clone())
            .with_modalities(&[Modality::Text, Modality::Image]);
        if let Some(bytes) = source {
            req = req.with_part(Part::inline("image/png", images::to_png(bytes)?));
        }
        req = req.with_part(Part::text(prompt));

        let resp = self.provider.generate(req).await?;
        let artifact = match resp.image() {
            Some((_, data)) => Some(
                images::write_artifact(&self.artifact_dir, data)
                    .context("failed to store generated image")?,
            ),
            None => None,
        };
        Ok((artifact, resp.last_text().unwrap_or_default().to_string()))
    }
}
