use super::{
    BoxFuture, ChatChunk, ChunkStream, GenerateRequest, GenerateResponse, Modality, Part, Provider,
    ResponsePart,
};
use anyhow::{anyhow, Context};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/";

#[derive(Debug, Clone)]
pub struct GoogleProvider {
    http: reqwest::Client,
    auth: GoogleAuth,
    api_base: Url,
}

#[derive(Debug, Clone)]
pub enum GoogleAuth {
    ApiKey(String),
    BearerToken(String),
}

impl GoogleProvider {
    pub fn new(http: reqwest::Client, auth: GoogleAuth) -> anyhow::Result<Self> {
        Self::with_api_base(http, auth, DEFAULT_API_BASE)
    }

    pub fn with_api_base(
        http: reqwest::Client,
        auth: GoogleAuth,
        api_base: &str,
    ) -> anyhow::Result<Self> {
        // Url::join drops the last path segment unless the base ends with '/'.
        let base = if api_base.ends_with('/') {
            api_base.to_string()
        } else {
            format!("{api_base}/")
        };
        Ok(Self {
            http,
            auth,
            api_base: Url::parse(&base).with_context(|| format!("invalid api base: {api_base}"))?,
        })
    }

    fn build_url(&self, model: &str, stream: bool) -> anyhow::Result<Url> {
        // Docs: https://ai.google.dev/api/generate-content
        let method = if stream {
            "streamGenerateContent"
        } else {
            "generateContent"
        };
        let mut url = self
            .api_base
            .join(&format!("v1beta/models/{model}:{method}"))?;

        match &self.auth {
            GoogleAuth::ApiKey(key) => {
                url.query_pairs_mut().append_pair("key", key);
            }
            GoogleAuth::BearerToken(_) => {
                // OAuth uses Authorization header.
            }
        }

        if stream {
            url.query_pairs_mut().append_pair("alt", "sse");
        }
        Ok(url)
    }

    fn headers(&self) -> anyhow::Result<HeaderMap> {
        let mut h = HeaderMap::new();
        h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let GoogleAuth::BearerToken(tok) = &self.auth {
            let v = HeaderValue::from_str(&format!("Bearer {tok}"))
                .map_err(|e| anyhow!(e))?;
            h.insert(AUTHORIZATION, v);
        }
        Ok(h)
    }

    async fn post(&self, req: &GenerateRequest, stream: bool) -> anyhow::Result<reqwest::Response> {
        let url = self.build_url(&req.model, stream)?;
        let headers = self.headers()?;
        let body = GenerateContentRequest::from_request(req);

        tracing::debug!(model = %req.model, stream, parts = req.parts.len(), "Gemini request");

        let resp = self
            .http
            .post(url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .context("failed to start Gemini request")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Gemini API error: HTTP {status}: {text}"));
        }
        Ok(resp)
    }
}

impl Provider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    fn generate(&self, req: GenerateRequest) -> BoxFuture<GenerateResponse> {
        let this = self.clone();

        Box::pin(async move {
            let resp = this.post(&req, false).await?;
            let body: GenerateContentResponse = resp
                .json()
                .await
                .context("failed to parse Gemini response JSON")?;
            into_generate_response(body)
        })
    }

    fn stream_chat(&self, req: GenerateRequest) -> BoxFuture<ChunkStream> {
        let this = self.clone();

        Box::pin(async move {
            let resp = this.post(&req, true).await?;

            let (tx, rx) = mpsc::channel::<anyhow::Result<ChatChunk>>(64);

            tokio::spawn(async move {
                let mut stream = resp.bytes_stream();
                let mut parser = SseParser::new();

                while let Some(item) = stream.next().await {
                    let bytes = match item {
                        Ok(b) => b,
                        Err(e) => {
                            let _ = tx.send(Err(anyhow!(e).context("network stream error"))).await;
                            return;
                        }
                    };

                    for ev in parser.push(&bytes) {
                        match ev {
                            Ok(SseEvent::Data(data)) => {
                                if data.trim().is_empty() {
                                    continue;
                                }

                                let parsed: Result<GenerateContentResponse, _> =
                                    serde_json::from_str(&data);
                                match parsed {
                                    Ok(r) => {
                                        if let Some(reason) = stream_refusal(&r) {
                                            let _ = tx
                                                .send(Err(anyhow!("Gemini returned no answer: {reason}")))
                                                .await;
                                            return;
                                        }
                                        if let Some(text) = extract_text(&r) {
                                            if tx.send(Ok(ChatChunk { text })).await.is_err() {
                                                return;
                                            }
                                        }
                                    }
                                    Err(e) => {
                                        let _ = tx
                                            .send(Err(anyhow!(e).context("failed to parse SSE JSON")))
                                            .await;
                                        return;
                                    }
                                }
                            }
                            Ok(SseEvent::Other) => {}
                            Err(e) => {
                                let _ = tx.send(Err(e)).await;
                                return;
                            }
                        }
                    }
                }
            });

            Ok(Box::pin(ReceiverStream::new(rx)) as ChunkStream)
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

impl GenerateContentRequest {
    fn from_request(req: &GenerateRequest) -> Self {
        let parts = req
            .parts
            .iter()
            .map(|p| match p {
                Part::Text(t) => WirePart::text(t.clone()),
                Part::Inline { mime_type, data } => WirePart {
                    text: None,
                    inline_data: Some(InlineData {
                        mime_type: mime_type.clone(),
                        data: BASE64.encode(data),
                    }),
                },
            })
            .collect();

        let opts = &req.options;
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            system_instruction: req.system_instruction.as_ref().map(|s| Content {
                role: None,
                parts: vec![WirePart::text(s.clone())],
            }),
            generation_config: GenerationConfig {
                max_output_tokens: Some(opts.max_output_tokens),
                temperature: Some(opts.temperature),
                top_p: Some(opts.top_p),
                stop_sequences: opts.stop_sequences.clone(),
                response_modalities: req
                    .response_modalities
                    .iter()
                    .map(|m| match m {
                        Modality::Text => "TEXT",
                        Modality::Image => "IMAGE",
                    })
                    .collect(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop_sequences: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    response_modalities: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl WirePart {
    fn text(t: String) -> Self {
        Self {
            text: Some(t),
            inline_data: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

fn extract_text(r: &GenerateContentResponse) -> Option<String> {
    // Concatenate all text parts of the first candidate.
    let cand = r.candidates.first()?;
    let content = cand.content.as_ref()?;
    let mut out = String::new();
    for p in &content.parts {
        if let Some(t) = &p.text {
            out.push_str(t);
        }
    }
    if out.is_empty() { None } else { Some(out) }
}

/// Why a stream event carries a refusal instead of text, if it does.
///
/// A final event with no content and `STOP`/`MAX_TOKENS` is a normal end.
fn stream_refusal(r: &GenerateContentResponse) -> Option<String> {
    let Some(cand) = r.candidates.first() else {
        return r.prompt_feedback.as_ref()?.block_reason.clone();
    };
    if cand.content.is_some() {
        return None;
    }
    cand.finish_reason
        .clone()
        .filter(|reason| !matches!(reason.as_str(), "STOP" | "MAX_TOKENS" | "FINISH_REASON_UNSPECIFIED"))
}

fn into_generate_response(r: GenerateContentResponse) -> anyhow::Result<GenerateResponse> {
    let Some(cand) = r.candidates.into_iter().next() else {
        let reason = r
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates returned".to_string());
        return Err(anyhow!("Gemini returned no answer: {reason}"));
    };

    let Some(content) = cand.content else {
        let reason = cand.finish_reason.unwrap_or_else(|| "unknown".to_string());
        return Err(anyhow!("Gemini candidate has no content (finish reason: {reason})"));
    };

    let mut parts = Vec::with_capacity(content.parts.len());
    for p in content.parts {
        if let Some(text) = p.text.filter(|t| !t.is_empty()) {
            parts.push(ResponsePart::Text(text));
        }
        if let Some(inline) = p.inline_data {
            let data = BASE64
                .decode(inline.data.as_bytes())
                .context("inline data is not valid base64")?;
            parts.push(ResponsePart::Image {
                mime_type: inline.mime_type,
                data,
            });
        }
    }
    Ok(GenerateResponse { parts })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SseEvent {
    Data(String),
    Other,
}

/// Minimal SSE parser.
///
/// - Collects UTF-8 lines
/// - Emits Data events when a blank line ends an event
struct SseParser {
    buf: Vec<u8>,
    cur_data: String,
}

impl SseParser {
    fn new() -> Self {
        Self {
            buf: Vec::new(),
            cur_data: String::new(),
        }
    }

    fn push(&mut self, chunk: &[u8]) -> Vec<anyhow::Result<SseEvent>> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line = self.buf.drain(..=pos).collect::<Vec<u8>>();
            line.pop();
            if line.ends_with(b"\r") {
                line.pop();
            }

            if line.is_empty() {
                if !self.cur_data.is_empty() {
                    // Remove trailing newline from data field accumulation.
                    if self.cur_data.ends_with('\n') {
                        self.cur_data.pop();
                    }
                    let data = std::mem::take(&mut self.cur_data);
                    out.push(Ok(SseEvent::Data(data)));
                }
                continue;
            }

            let s = match std::str::from_utf8(&line) {
                Ok(s) => s,
                Err(e) => {
                    out.push(Err(anyhow!(e).context("SSE line is not valid UTF-8")));
                    continue;
                }
            };

            if let Some(rest) = s.strip_prefix("data:") {
                let rest = rest.strip_prefix(' ').unwrap_or(rest);
                self.cur_data.push_str(rest);
                self.cur_data.push('\n');
            } else {
                // Ignore other fields: event:, id:, retry:, comments
                out.push(Ok(SseEvent::Other));
            }
        }

        out
    }
}
