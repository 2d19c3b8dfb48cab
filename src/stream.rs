//! Incremental chat turns.
//!
//! The observer always sees the latest fully received prefix of the answer:
//! fragments are consumed strictly in arrival order and the accumulator only
//! grows by concatenation. A failure at any point replaces the partial text
//! with an error marker and ends the turn.

use crate::provider::{GenerateRequest, Provider};
use crate::session::{ConversationLog, Prompt, Response, SessionError};
use tokio_stream::StreamExt;

/// Receives the log after every state change of a turn.
pub trait Observer {
    fn emit(&mut self, log: &ConversationLog);
}

impl<F: FnMut(&ConversationLog)> Observer for F {
    fn emit(&mut self, log: &ConversationLog) {
        self(log)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed(String),
    Failed(String),
}

pub fn chat_error_marker(e: &anyhow::Error) -> String {
    format!("Lỗi: {e:#}")
}

pub async fn run_streaming_turn<P, O>(
    log: &mut ConversationLog,
    provider: &P,
    prompt: Prompt,
    req: GenerateRequest,
    observer: &mut O,
) -> Result<StreamOutcome, SessionError>
where
    P: Provider + ?Sized,
    O: Observer + ?Sized,
{
    log.append_pending(prompt);
    observer.emit(log);

    let mut stream = match provider.stream_chat(req).await {
        Ok(s) => s,
        Err(e) => return fail(log, observer, e),
    };

    let mut acc = String::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => {
                if chunk.text.is_empty() {
                    continue;
                }
                acc.push_str(&chunk.text);
                log.set_last_response(Response::Text(acc.clone()))?;
                observer.emit(log);
            }
            Err(e) => return fail(log, observer, e),
        }
    }

    if acc.is_empty() {
        // The pending marker must not outlive the turn.
        log.set_last_response(Response::Text(String::new()))?;
        observer.emit(log);
    }
    tracing::debug!(provider = provider.name(), chars = acc.len(), "stream finished");
    Ok(StreamOutcome::Completed(acc))
}

fn fail<O: Observer + ?Sized>(
    log: &mut ConversationLog,
    observer: &mut O,
    e: anyhow::Error,
) -> Result<StreamOutcome, SessionError> {
    tracing::error!(error = %format!("{e:#}"), "chat stream failed");
    let marker = chat_error_marker(&e);
    log.set_last_response(Response::Error(marker.clone()))?;
    observer.emit(log);
    Ok(StreamOutcome::Failed(marker))
}
