use crate::config::Config;
use crate::paths;
use crate::provider::{self, SharedProvider};
use crate::server::{self, AppState, Defaults};
use crate::session::{ConversationLog, Prompt, Response};
use crate::stream::{Observer, StreamOutcome};
use crate::submit::{ModelSet, Pipeline, TurnSettings};
use anyhow::Context;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub fn build_provider(
    http: &reqwest::Client,
    cfg: &Config,
    provider_name: &str,
) -> anyhow::Result<SharedProvider> {
    match provider_name {
        "google" => {
            #[cfg(feature = "google")]
            {
                use provider::google::{GoogleAuth, GoogleProvider};

                let api_key = std::env::var("GEMINI_API_KEY")
                    .ok()
                    .or_else(|| cfg.google.api_key.clone())
                    .filter(|k| !k.trim().is_empty());
                let access_token = std::env::var("GEMINI_ACCESS_TOKEN")
                    .ok()
                    .or_else(|| cfg.google.access_token.clone())
                    .filter(|t| !t.trim().is_empty());

                let auth = match (api_key, access_token) {
                    (Some(key), _) => GoogleAuth::ApiKey(key),
                    (None, Some(token)) => GoogleAuth::BearerToken(token),
                    (None, None) => anyhow::bail!(
                        "No credentials found. Set GEMINI_API_KEY (or GEMINI_ACCESS_TOKEN), \
                         or google.api_key in config.toml"
                    ),
                };

                let p = match cfg.google.api_base.as_deref() {
                    Some(base) => GoogleProvider::with_api_base(http.clone(), auth, base)?,
                    None => GoogleProvider::new(http.clone(), auth)?,
                };
                Ok(Arc::new(p))
            }
            #[cfg(not(feature = "google"))]
            {
                let _ = http;
                let _ = cfg;
                anyhow::bail!("google provider is not enabled in this build")
            }
        }
        "stub" => Ok(Arc::new(provider::stub::StubProvider::new())),
        other => anyhow::bail!("unknown provider: {other}"),
    }
}

pub fn build_pipeline(provider: SharedProvider, cfg: &Config, streaming: bool) -> anyhow::Result<Pipeline> {
    let artifact_dir = paths::artifact_dir(cfg.paths.artifact_dir.as_deref())?;
    let models = ModelSet {
        text: cfg.models.text.clone(),
        vision: cfg.models.vision.clone(),
        image: cfg.models.image.clone(),
    };
    Ok(Pipeline::new(provider, models, artifact_dir, streaming))
}

pub async fn cmd_serve(
    provider: SharedProvider,
    cfg: &Config,
    bind: Option<String>,
    no_stream: bool,
) -> anyhow::Result<()> {
    let streaming = cfg.server.streaming && !no_stream;
    let pipeline = build_pipeline(provider, cfg, streaming)?;
    tracing::info!(
        provider = pipeline.provider_name(),
        model = %cfg.models.text,
        streaming,
        "starting web UI"
    );

    let artifact_dir = paths::artifact_dir(cfg.paths.artifact_dir.as_deref())?;
    let state = AppState::new(pipeline, Defaults::from_config(cfg, streaming), artifact_dir);
    let bind = bind.unwrap_or_else(|| cfg.server.bind.clone());
    server::run(state, &bind).await
}

pub async fn cmd_ask(provider: SharedProvider, cfg: &Config, prompt: &str) -> anyhow::Result<()> {
    let pipeline = build_pipeline(provider, cfg, true)?;
    let settings = TurnSettings {
        options: cfg.generation.options(),
        system_instruction: Some(cfg.instructions.chat.clone()),
    };

    let mut log = ConversationLog::new();
    let mut out = SuffixPrinter::new(std::io::stdout());
    let outcome = pipeline.chat(&mut log, prompt, &settings, &mut out).await?;
    println!();

    match outcome {
        StreamOutcome::Completed(_) => Ok(()),
        StreamOutcome::Failed(marker) => anyhow::bail!(marker),
    }
}

pub async fn cmd_summarize(provider: SharedProvider, cfg: &Config, file: &Path) -> anyhow::Result<()> {
    let pipeline = build_pipeline(provider, cfg, false)?;
    let settings = TurnSettings {
        options: cfg.generation.options(),
        system_instruction: Some(cfg.instructions.documents.clone()),
    };
    let mut log = ConversationLog::new();
    pipeline.summarize_document(&mut log, file, &settings).await;
    finish(&log)
}

pub async fn cmd_describe(provider: SharedProvider, cfg: &Config, image: &Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(image)
        .with_context(|| format!("failed to read image: {}", image.display()))?;
    let pipeline = build_pipeline(provider, cfg, false)?;
    let settings = TurnSettings {
        options: cfg.generation.options(),
        system_instruction: Some(cfg.instructions.images.clone()),
    };
    let mut log = ConversationLog::new();
    pipeline.describe_image(&mut log, &bytes, &settings).await;
    finish(&log)
}

pub async fn cmd_generate(
    provider: SharedProvider,
    cfg: &Config,
    prompt: &str,
    image: Option<&Path>,
) -> anyhow::Result<()> {
    let source = match image {
        Some(p) => Some(
            std::fs::read(p).with_context(|| format!("failed to read image: {}", p.display()))?,
        ),
        None => None,
    };
    let pipeline = build_pipeline(provider, cfg, false)?;
    let mut log = ConversationLog::new();
    pipeline
        .generate_image(&mut log, prompt, source.as_deref(), &cfg.generation.options())
        .await;
    finish(&log)
}

/// Print the log; an error turn makes the command fail.
fn finish(log: &ConversationLog) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    write_log(&mut out, log)?;
    out.flush().ok();

    match log.turns().iter().find_map(|t| match &t.response {
        Response::Error(msg) => Some(msg.clone()),
        _ => None,
    }) {
        Some(msg) => anyhow::bail!(msg),
        None => Ok(()),
    }
}

fn write_log(out: &mut impl Write, log: &ConversationLog) -> std::io::Result<()> {
    for turn in log.turns() {
        if let Prompt::Marker(m) = &turn.prompt {
            writeln!(out, "{m}")?;
        }
        match &turn.response {
            Response::Text(t) => writeln!(out, "{t}")?,
            Response::Image(art) => writeln!(out, "{}", art.path.display())?,
            Response::Pending | Response::Error(_) => {}
        }
    }
    Ok(())
}

/// Writes only what the last answer gained since the previous snapshot.
struct SuffixPrinter<W: Write> {
    out: W,
    printed: usize,
}

impl<W: Write> SuffixPrinter<W> {
    fn new(out: W) -> Self {
        Self { out, printed: 0 }
    }
}

impl<W: Write> Observer for SuffixPrinter<W> {
    fn emit(&mut self, log: &ConversationLog) {
        let Some(Response::Text(text)) = log.last().map(|t| &t.response) else {
            return;
        };
        if let Some(suffix) = text.get(self.printed..) {
            let _ = write!(self.out, "{suffix}");
            let _ = self.out.flush();
            self.printed = text.len();
        }
    }
}
