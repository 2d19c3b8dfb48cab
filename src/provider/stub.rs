use super::{
    BoxFuture, ChatChunk, ChunkStream, GenerateRequest, GenerateResponse, Modality, Part, Provider,
    ResponsePart,
};
use anyhow::anyhow;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Offline provider. Echoes prompts back by default; tests load a script
/// to pin down exactly what the "remote" side does.
#[derive(Debug, Default, Clone)]
pub struct StubProvider {
    script: Option<Arc<Script>>,
    requests: Arc<Mutex<Vec<GenerateRequest>>>,
}

#[derive(Debug, Default, Clone)]
#[cfg_attr(not(test), allow(dead_code))]
pub struct Script {
    /// Fragments yielded by `stream_chat`, in order.
    pub fragments: Vec<String>,
    /// Fail the stream after this many fragments were sent.
    pub fail_after: Option<(usize, String)>,
    /// Fail before any fragment is produced.
    pub fail_to_start: Option<String>,
    /// Result of `generate`; `Err` carries the failure message.
    pub generate: Option<Result<GenerateResponse, String>>,
}

impl StubProvider {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn scripted(script: Script) -> Self {
        Self {
            script: Some(Arc::new(script)),
            requests: Arc::default(),
        }
    }

    /// Every request seen so far, oldest first.
    #[cfg(test)]
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn record(&self, req: &GenerateRequest) {
        if let Ok(mut r) = self.requests.lock() {
            r.push(req.clone());
        }
    }
}

impl Provider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn generate(&self, req: GenerateRequest) -> BoxFuture<GenerateResponse> {
        self.record(&req);
        let script = self.script.clone();

        Box::pin(async move {
            match script.as_ref().and_then(|s| s.generate.clone()) {
                Some(Ok(resp)) => Ok(resp),
                Some(Err(msg)) => Err(anyhow!(msg)),
                None => Ok(echo_response(&req)),
            }
        })
    }

    fn stream_chat(&self, req: GenerateRequest) -> BoxFuture<ChunkStream> {
        self.record(&req);
        let script = self.script.clone();

        Box::pin(async move {
            let (tx, rx) = mpsc::channel::<anyhow::Result<ChatChunk>>(32);

            match script {
                Some(script) => {
                    if let Some(msg) = &script.fail_to_start {
                        return Err(anyhow!(msg.clone()));
                    }
                    tokio::spawn(async move {
                        for (i, text) in script.fragments.iter().enumerate() {
                            if let Some((n, msg)) = &script.fail_after {
                                if i == *n {
                                    let _ = tx.send(Err(anyhow!(msg.clone()))).await;
                                    return;
                                }
                            }
                            if tx.send(Ok(ChatChunk { text: text.clone() })).await.is_err() {
                                return;
                            }
                        }
                        if let Some((n, msg)) = &script.fail_after {
                            if *n >= script.fragments.len() {
                                let _ = tx.send(Err(anyhow!(msg.clone()))).await;
                            }
                        }
                    });
                }
                None => {
                    let prompt = prompt_text(&req);
                    tokio::spawn(async move {
                        let parts = [
                            format!("[stub provider, model: {}]\n", req.model),
                            "You said: ".to_string(),
                            prompt,
                        ];
                        for p in parts {
                            tokio::time::sleep(Duration::from_millis(120)).await;
                            if tx.send(Ok(ChatChunk { text: p })).await.is_err() {
                                break;
                            }
                        }
                    });
                }
            }

            Ok(Box::pin(ReceiverStream::new(rx)) as ChunkStream)
        })
    }
}

fn prompt_text(req: &GenerateRequest) -> String {
    req.parts
        .iter()
        .filter_map(|p| match p {
            Part::Text(t) => Some(t.as_str()),
            Part::Inline { .. } => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn echo_response(req: &GenerateRequest) -> GenerateResponse {
    let attachments = req
        .parts
        .iter()
        .filter_map(|p| match p {
            Part::Inline { mime_type, data } => Some(format!("{mime_type} ({} bytes)", data.len())),
            Part::Text(_) => None,
        })
        .collect::<Vec<_>>();

    let mut text = format!("[stub provider, model: {}] You said: {}", req.model, prompt_text(req));
    if !attachments.is_empty() {
        text.push_str(&format!("\nattachments: {}", attachments.join(", ")));
    }

    let mut parts = Vec::new();
    if req.response_modalities.contains(&Modality::Image) {
        parts.push(ResponsePart::Image {
            mime_type: "image/png".to_string(),
            data: placeholder_png(),
        });
    }
    parts.push(ResponsePart::Text(text));
    GenerateResponse { parts }
}

/// A small grey square so image flows work offline.
fn placeholder_png() -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        64,
        64,
        image::Rgb([128, 128, 128]),
    ));
    crate::images::encode(&img, image::ImageFormat::Png).unwrap_or_default()
}
