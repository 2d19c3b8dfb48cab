//! HTTP front-end: the browser page plus a small JSON/SSE API.
//!
//! Every browser page load creates a session with one conversation log per
//! tab. A tab runs at most one operation at a time; a second one gets 409.

use crate::config::Config;
use crate::documents::ACCEPTED_EXTENSIONS;
use crate::images;
use crate::provider::{parse_stop_sequences, GenerationOptions};
use crate::session::{ConversationLog, Prompt, Response, Turn};
use crate::stream::Observer;
use crate::submit::{Pipeline, TurnSettings};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Uploads larger than this are refused before they reach a handler.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    Chat,
    Documents,
    Images,
    Studio,
}

type SharedLog = Arc<Mutex<ConversationLog>>;

/// The four logs of one browser page.
#[derive(Debug, Default)]
pub struct BrowserSession {
    chat: SharedLog,
    documents: SharedLog,
    images: SharedLog,
    studio: SharedLog,
}

impl BrowserSession {
    pub fn log(&self, tab: Tab) -> SharedLog {
        match tab {
            Tab::Chat => self.chat.clone(),
            Tab::Documents => self.documents.clone(),
            Tab::Images => self.images.clone(),
            Tab::Studio => self.studio.clone(),
        }
    }
}

/// Values the settings panel starts from.
#[derive(Debug, Clone, Serialize)]
pub struct Defaults {
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub stop_sequences: String,
    pub instructions: HashMap<Tab, String>,
    pub streaming: bool,
    pub accepted_extensions: &'static [&'static str],
}

impl Defaults {
    pub fn from_config(cfg: &Config, streaming: bool) -> Self {
        let g = &cfg.generation;
        let i = &cfg.instructions;
        Self {
            max_output_tokens: g.max_output_tokens,
            temperature: g.temperature,
            top_p: g.top_p,
            stop_sequences: g.stop_sequences.clone(),
            instructions: HashMap::from([
                (Tab::Chat, i.chat.clone()),
                (Tab::Documents, i.documents.clone()),
                (Tab::Images, i.images.clone()),
            ]),
            streaming,
            accepted_extensions: ACCEPTED_EXTENSIONS,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pipeline: Pipeline,
    defaults: Arc<Defaults>,
    artifact_dir: PathBuf,
    sessions: Arc<DashMap<Uuid, Arc<BrowserSession>>>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, defaults: Defaults, artifact_dir: PathBuf) -> Self {
        Self {
            pipeline,
            defaults: Arc::new(defaults),
            artifact_dir,
            sessions: Arc::default(),
        }
    }

    pub fn create_session(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.insert(id, Arc::default());
        tracing::debug!(%id, sessions = self.sessions.len(), "session created");
        id
    }

    pub fn session(&self, id: Uuid) -> Option<Arc<BrowserSession>> {
        self.sessions.get(&id).map(|s| s.value().clone())
    }

    fn lock_tab(&self, id: Uuid, tab: Tab) -> Result<OwnedMutexGuard<ConversationLog>, ApiError> {
        let session = self.session(id).ok_or(ApiError::SessionNotFound)?;
        session.log(tab).try_lock_owned().map_err(|_| ApiError::Busy)
    }

    fn settings(&self, form: OptionsForm, tab: Tab) -> Result<TurnSettings, ApiError> {
        let d = &self.defaults;
        let options = GenerationOptions {
            max_output_tokens: form.max_output_tokens.unwrap_or(d.max_output_tokens),
            temperature: form.temperature.unwrap_or(d.temperature),
            top_p: form.top_p.unwrap_or(d.top_p),
            stop_sequences: parse_stop_sequences(
                form.stop_sequences.as_deref().unwrap_or(&d.stop_sequences),
            ),
        };
        options
            .validate()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        let system_instruction = form
            .system_instruction
            .or_else(|| d.instructions.get(&tab).cloned());
        Ok(TurnSettings {
            options,
            system_instruction,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unknown session")]
    SessionNotFound,
    #[error("not found")]
    NotFound,
    #[error("another request is still running in this tab")]
    Busy,
    #[error("{0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            ApiError::SessionNotFound | ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Busy => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Settings panel values; anything missing falls back to [`Defaults`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OptionsForm {
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub stop_sequences: Option<String>,
    pub system_instruction: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct TurnView {
    pub prompt: Prompt,
    pub response: ResponseView,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseView {
    Pending,
    Text { text: String },
    Image { url: String, mime_type: String },
    Error { text: String },
}

fn render(log: &ConversationLog) -> Vec<TurnView> {
    log.turns().iter().map(render_turn).collect()
}

fn render_turn(turn: &Turn) -> TurnView {
    let response = match &turn.response {
        Response::Pending => ResponseView::Pending,
        Response::Text(text) => ResponseView::Text { text: text.clone() },
        Response::Image(art) => ResponseView::Image {
            url: format!("/artifacts/{}", art.file_name().unwrap_or_default()),
            mime_type: art.mime_type.clone(),
        },
        Response::Error(text) => ResponseView::Error { text: text.clone() },
    };
    TurnView {
        prompt: turn.prompt.clone(),
        response,
    }
}

/// Forwards every log snapshot to the SSE response.
struct SseObserver {
    tx: mpsc::UnboundedSender<Vec<TurnView>>,
}

impl Observer for SseObserver {
    fn emit(&mut self, log: &ConversationLog) {
        // A closed page must not stop the turn; the log still completes.
        let _ = self.tx.send(render(log));
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/defaults", get(defaults))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}/logs/{tab}", get(get_log).delete(clear_log))
        .route("/api/sessions/{id}/chat", post(chat))
        .route("/api/sessions/{id}/documents", post(summarize_document))
        .route("/api/sessions/{id}/images", post(describe_image))
        .route("/api/sessions/{id}/studio", post(generate_image))
        .route("/artifacts/{name}", get(artifact))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(state: AppState, bind_addr: &str) -> anyhow::Result<()> {
    let app = router(state);
    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("web UI listening on http://{} (Ctrl+C to stop)", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("web UI stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn defaults(State(state): State<AppState>) -> Json<Defaults> {
    Json(state.defaults.as_ref().clone())
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionCreated {
    id: Uuid,
}

async fn create_session(State(state): State<AppState>) -> Json<SessionCreated> {
    Json(SessionCreated {
        id: state.create_session(),
    })
}

async fn get_log(
    State(state): State<AppState>,
    Path((id, tab)): Path<(Uuid, Tab)>,
) -> Result<Json<Vec<TurnView>>, ApiError> {
    let session = state.session(id).ok_or(ApiError::SessionNotFound)?;
    let log = session.log(tab);
    let log = log.lock().await;
    Ok(Json(render(&log)))
}

async fn clear_log(
    State(state): State<AppState>,
    Path((id, tab)): Path<(Uuid, Tab)>,
) -> Result<Json<Vec<TurnView>>, ApiError> {
    let mut log = state.lock_tab(id, tab)?;
    if !log.is_empty() {
        tracing::debug!(%id, ?tab, turns = log.len(), "clearing log");
        log.clear();
    }
    Ok(Json(Vec::new()))
}

#[derive(Debug, Deserialize)]
struct ChatBody {
    message: String,
    #[serde(default)]
    options: OptionsForm,
}

async fn chat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ChatBody>,
) -> Result<Sse<impl futures_core::Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    if body.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must be non-empty".to_string()));
    }
    let settings = state.settings(body.options, Tab::Chat)?;
    let mut log = state.lock_tab(id, Tab::Chat)?;

    let (tx, rx) = mpsc::unbounded_channel();
    let pipeline = state.pipeline.clone();
    let message = body.message;
    tokio::spawn(async move {
        let mut observer = SseObserver { tx };
        if let Err(e) = pipeline.chat(&mut log, &message, &settings, &mut observer).await {
            tracing::error!(error = %e, "chat turn left the log in an unexpected state");
        }
    });

    let events = UnboundedReceiverStream::new(rx)
        .map(|turns| Event::default().event("log").json_data(turns));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Collected multipart fields: files by field name, plus text fields.
#[derive(Debug, Default)]
struct Upload {
    files: HashMap<String, (Option<String>, Bytes)>,
    texts: HashMap<String, String>,
}

impl Upload {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut out = Upload::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let file_name = field.file_name().map(str::to_string);
            match file_name {
                Some(file_name) => {
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                    if !data.is_empty() {
                        out.files.insert(name, (Some(file_name), data));
                    }
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                    out.texts.insert(name, text);
                }
            }
        }
        Ok(out)
    }

    fn options(&self) -> Result<OptionsForm, ApiError> {
        match self.texts.get("options") {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw)
                .map_err(|e| ApiError::BadRequest(format!("invalid options: {e}"))),
            _ => Ok(OptionsForm::default()),
        }
    }

    fn take_file(&mut self, field: &str) -> Option<(Option<String>, Bytes)> {
        self.files.remove(field)
    }
}

/// Run `work` on its own task so a dropped connection cannot cut a turn short.
async fn detached<T, F>(work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: std::future::Future<Output = T> + Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))
}

async fn summarize_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<Vec<TurnView>>, ApiError> {
    let mut upload = Upload::read(multipart).await?;
    let settings = state.settings(upload.options()?, Tab::Documents)?;
    let (file_name, data) = upload
        .take_file("file")
        .ok_or_else(|| ApiError::BadRequest("missing file".to_string()))?;

    let ext = file_name
        .as_deref()
        .and_then(|n| std::path::Path::new(n).extension())
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    if !ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "unsupported document type {ext:?}; accepted: {}",
            ACCEPTED_EXTENSIONS.join(", ")
        )));
    }

    let mut log = state.lock_tab(id, Tab::Documents)?;
    let pipeline = state.pipeline.clone();
    let turns = detached(async move {
        let spooled = tempfile::Builder::new()
            .prefix("upload_")
            .suffix(&ext)
            .tempfile()
            .and_then(|mut f| {
                std::io::Write::write_all(&mut f, &data)?;
                Ok(f)
            });
        match spooled {
            Ok(file) => pipeline.summarize_document(&mut log, file.path(), &settings).await,
            Err(e) => {
                tracing::error!(error = %e, "failed to spool upload");
                log.append_complete(
                    Prompt::marker(crate::submit::DOCUMENT_ERROR_MARKER),
                    Response::error(e.to_string()),
                );
            }
        }
        render(&log)
    })
    .await?;
    Ok(Json(turns))
}

async fn describe_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<Vec<TurnView>>, ApiError> {
    let mut upload = Upload::read(multipart).await?;
    let settings = state.settings(upload.options()?, Tab::Images)?;
    let (_, data) = upload
        .take_file("image")
        .ok_or_else(|| ApiError::BadRequest("missing image".to_string()))?;

    let mut log = state.lock_tab(id, Tab::Images)?;
    let pipeline = state.pipeline.clone();
    let turns = detached(async move {
        pipeline.describe_image(&mut log, &data, &settings).await;
        render(&log)
    })
    .await?;
    Ok(Json(turns))
}

async fn generate_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<Vec<TurnView>>, ApiError> {
    let mut upload = Upload::read(multipart).await?;
    let settings = state.settings(upload.options()?, Tab::Studio)?;
    let prompt = upload.texts.remove("prompt").unwrap_or_default();
    if prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("prompt must be non-empty".to_string()));
    }
    let source = upload.take_file("image").map(|(_, data)| data);

    let mut log = state.lock_tab(id, Tab::Studio)?;
    let pipeline = state.pipeline.clone();
    let turns = detached(async move {
        pipeline
            .generate_image(&mut log, &prompt, source.as_deref(), &settings.options)
            .await;
        render(&log)
    })
    .await?;
    Ok(Json(turns))
}

async fn artifact(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !images::is_artifact_name(&name) {
        return Err(ApiError::NotFound);
    }
    let data = tokio::fs::read(state.artifact_dir.join(&name))
        .await
        .map_err(|_| ApiError::NotFound)?;
    Ok(([(header::CONTENT_TYPE, "image/png")], data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::tests::sample_png;
    use crate::ooxml::tests::xlsx_fixture;
    use crate::provider::stub::{Script, StubProvider};
    use crate::provider::GenerateResponse;
    use crate::submit::ModelSet;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use tower::util::ServiceExt;

    struct Harness {
        state: AppState,
        _dir: tempfile::TempDir,
    }

    fn harness(script: Option<Script>) -> Harness {
        let stub = match script {
            Some(s) => StubProvider::scripted(s),
            None => StubProvider::new(),
        };
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::default();
        let pipeline = Pipeline::new(
            Arc::new(stub),
            ModelSet {
                text: cfg.models.text.clone(),
                vision: cfg.models.vision.clone(),
                image: cfg.models.image.clone(),
            },
            dir.path().to_path_buf(),
            true,
        );
        let state = AppState::new(pipeline, Defaults::from_config(&cfg, true), dir.path().to_path_buf());
        Harness { state, _dir: dir }
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Bytes) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, body)
    }

    fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    /// Hand-rolled multipart body: `(field, Some(file name) for files, bytes)`.
    fn multipart_post(uri: &str, fields: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
        const BOUNDARY: &str = "test-boundary-7d1";
        let mut body = Vec::new();
        for (name, file_name, data) in fields {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file_name {
                Some(f) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    fn json(body: &Bytes) -> serde_json::Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn new_session_starts_with_empty_logs() {
        let h = harness(None);
        let (status, body) = send(router(h.state.clone()), json_post("/api/sessions", serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        let id = json(&body)["id"].as_str().unwrap().to_string();

        for tab in ["chat", "documents", "images", "studio"] {
            let (status, body) = send(router(h.state.clone()), get(&format!("/api/sessions/{id}/logs/{tab}"))).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(json(&body), serde_json::json!([]));
        }
    }

    #[tokio::test]
    async fn chat_streams_every_snapshot_as_sse() {
        let h = harness(Some(Script {
            fragments: vec!["Xin ".into(), "chào".into()],
            ..Script::default()
        }));
        let id = h.state.create_session();

        let (status, body) = send(
            router(h.state.clone()),
            json_post(
                &format!("/api/sessions/{id}/chat"),
                serde_json::json!({"message": "Hello", "options": {"temperature": 0.2}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let body = String::from_utf8(body.to_vec()).unwrap();
        let snapshots: Vec<serde_json::Value> = body
            .lines()
            .filter_map(|l| l.strip_prefix("data: "))
            .map(|d| serde_json::from_str(d).unwrap())
            .collect();
        assert_eq!(body.matches("event: log").count(), 3);
        assert_eq!(
            snapshots.iter().map(|s| s[0]["response"].clone()).collect::<Vec<_>>(),
            vec![
                serde_json::json!({"kind": "pending"}),
                serde_json::json!({"kind": "text", "text": "Xin "}),
                serde_json::json!({"kind": "text", "text": "Xin chào"}),
            ]
        );

        let (_, body) = send(router(h.state.clone()), get(&format!("/api/sessions/{id}/logs/chat"))).await;
        assert_eq!(
            json(&body),
            serde_json::json!([{
                "prompt": {"kind": "text", "text": "Hello"},
                "response": {"kind": "text", "text": "Xin chào"}
            }])
        );
    }

    #[tokio::test]
    async fn busy_tab_rejects_a_second_operation() {
        let h = harness(None);
        let id = h.state.create_session();
        let log = h.state.session(id).unwrap().log(Tab::Chat);
        let _held = log.lock().await;

        let (status, _) = send(
            router(h.state.clone()),
            json_post(&format!("/api/sessions/{id}/chat"), serde_json::json!({"message": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let req = Request::builder()
            .method("DELETE")
            .uri(format!("/api/sessions/{id}/logs/chat"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(router(h.state.clone()), req).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn bad_requests_are_rejected() {
        let h = harness(None);
        let id = h.state.create_session();

        let (status, _) = send(
            router(h.state.clone()),
            json_post(&format!("/api/sessions/{id}/chat"), serde_json::json!({"message": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            router(h.state.clone()),
            json_post(
                &format!("/api/sessions/{id}/chat"),
                serde_json::json!({"message": "hi", "options": {"top_p": 4.0}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let unknown = Uuid::new_v4();
        let (status, _) = send(
            router(h.state.clone()),
            json_post(&format!("/api/sessions/{unknown}/chat"), serde_json::json!({"message": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn document_upload_appends_summary_and_clear_empties() {
        let h = harness(Some(Script {
            generate: Some(Ok(GenerateResponse::from_text("bảng hai dòng"))),
            ..Script::default()
        }));
        let id = h.state.create_session();
        let xlsx = xlsx_fixture();

        let (status, body) = send(
            router(h.state.clone()),
            multipart_post(
                &format!("/api/sessions/{id}/documents"),
                &[
                    ("file", Some("report.xlsx"), xlsx.as_slice()),
                    ("options", None, br#"{"system_instruction": ""}"#.as_slice()),
                ],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json(&body),
            serde_json::json!([{
                "prompt": {"kind": "marker", "text": "📄 Tóm tắt:"},
                "response": {"kind": "text", "text": "bảng hai dòng"}
            }])
        );

        let req = Request::builder()
            .method("DELETE")
            .uri(format!("/api/sessions/{id}/logs/documents"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(router(h.state.clone()), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body), serde_json::json!([]));
    }

    #[tokio::test]
    async fn unsupported_document_type_is_rejected() {
        let h = harness(None);
        let id = h.state.create_session();
        let (status, _) = send(
            router(h.state.clone()),
            multipart_post(
                &format!("/api/sessions/{id}/documents"),
                &[("file", Some("tool.exe"), b"MZ".as_slice())],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn generated_image_is_served_back() {
        let h = harness(None);
        let id = h.state.create_session();
        let png = sample_png();

        let (status, body) = send(
            router(h.state.clone()),
            multipart_post(
                &format!("/api/sessions/{id}/studio"),
                &[("prompt", None, "một con mèo".as_bytes()), ("image", Some("cat.png"), png.as_slice())],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let turns = json(&body);
        assert_eq!(turns.as_array().unwrap().len(), 3);
        assert_eq!(turns[1]["response"]["kind"], "image");
        let url = turns[1]["response"]["url"].as_str().unwrap().to_string();

        let resp = router(h.state.clone()).oneshot(get(&url)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/png");

        let (status, _) = send(router(h.state.clone()), get("/artifacts/..%2Fsecret.png")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn image_upload_is_described() {
        let h = harness(None);
        let id = h.state.create_session();
        let png = sample_png();
        let (status, body) = send(
            router(h.state.clone()),
            multipart_post(&format!("/api/sessions/{id}/images"), &[("image", Some("a.png"), png.as_slice())]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let turns = json(&body);
        assert_eq!(turns[0]["prompt"], serde_json::json!({"kind": "marker", "text": "🖼️"}));
        let text = turns[0]["response"]["text"].as_str().unwrap();
        assert!(text.contains("image/jpeg"), "{text}");
    }

    #[tokio::test]
    async fn index_and_defaults_are_served() {
        let h = harness(None);
        let (status, body) = send(router(h.state.clone()), get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8_lossy(&body).contains("<html"));

        let (status, body) = send(router(h.state.clone()), get("/api/defaults")).await;
        assert_eq!(status, StatusCode::OK);
        let d = json(&body);
        assert_eq!(d["max_output_tokens"], 500);
        assert_eq!(d["streaming"], true);
        assert!(d["instructions"]["chat"].as_str().unwrap().contains("tiếng Việt"));
    }
}
