//! Conversation log shared by every interaction mode.
//!
//! A log is an ordered list of turns. At most one turn is pending and it is
//! always the last one; callers only ever touch the log through the four
//! transitions below.

use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("conversation log is empty; no turn to update")]
    InvalidState,
}

/// What the user (or a handler acting for the user) put into a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Prompt {
    /// Text typed by the user.
    Text(String),
    /// Label inserted by a handler, e.g. the document summary header.
    Marker(String),
}

impl Prompt {
    pub fn text(s: impl Into<String>) -> Self {
        Prompt::Text(s.into())
    }

    pub fn marker(s: impl Into<String>) -> Self {
        Prompt::Marker(s.into())
    }
}

/// An image written to disk on behalf of a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageArtifact {
    pub path: PathBuf,
    pub mime_type: String,
}

impl ImageArtifact {
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Pending,
    Text(String),
    Image(ImageArtifact),
    Error(String),
}

impl Response {
    pub fn text(s: impl Into<String>) -> Self {
        Response::Text(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        Response::Error(s.into())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Response::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub prompt: Prompt,
    pub response: Response,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationLog {
    turns: Vec<Turn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn has_pending(&self) -> bool {
        self.last().is_some_and(|t| t.response.is_pending())
    }

    /// Start a turn whose response has not arrived yet.
    pub fn append_pending(&mut self, prompt: Prompt) {
        debug_assert!(!self.has_pending(), "a pending turn is already open");
        self.turns.push(Turn {
            prompt,
            response: Response::Pending,
        });
    }

    /// Overwrite the response of the last turn, partial or not.
    pub fn set_last_response(&mut self, response: Response) -> Result<(), SessionError> {
        let last = self.turns.last_mut().ok_or(SessionError::InvalidState)?;
        last.response = response;
        Ok(())
    }

    pub fn append_complete(&mut self, prompt: Prompt, response: Response) {
        self.turns.push(Turn { prompt, response });
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_log() -> ConversationLog {
        let mut log = ConversationLog::new();
        log.append_complete(Prompt::text("a"), Response::text("1"));
        log.append_complete(Prompt::marker("📄 Tóm tắt:"), Response::error("boom"));
        log
    }

    #[test]
    fn append_pending_grows_by_one_with_absent_response() {
        let mut log = sample_log();
        log.append_pending(Prompt::text("Hello"));

        assert_eq!(log.len(), 3);
        assert!(log.has_pending());
        assert_eq!(log.last().map(|t| &t.response), Some(&Response::Pending));
    }

    #[test]
    fn set_last_response_only_touches_last_turn() {
        let mut log = sample_log();
        log.append_pending(Prompt::text("Hello"));
        let before = log.turns()[..2].to_vec();

        log.set_last_response(Response::text("Xin ")).unwrap();
        log.set_last_response(Response::text("Xin chào")).unwrap();

        assert_eq!(&log.turns()[..2], before.as_slice());
        assert_eq!(
            log.last(),
            Some(&Turn {
                prompt: Prompt::text("Hello"),
                response: Response::text("Xin chào"),
            })
        );
        assert!(!log.has_pending());
    }

    #[test]
    fn set_last_response_on_empty_log_is_invalid_state() {
        let mut log = ConversationLog::new();
        assert_eq!(
            log.set_last_response(Response::text("x")),
            Err(SessionError::InvalidState)
        );
        assert!(log.is_empty());
    }

    #[test]
    fn clear_empties_any_log() {
        let mut log = sample_log();
        log.append_pending(Prompt::text("still waiting"));
        log.clear();
        assert!(log.is_empty());

        let mut empty = ConversationLog::new();
        empty.clear();
        assert!(empty.is_empty());
    }

    #[test]
    fn prompt_serializes_tagged() {
        let v = serde_json::to_value(Prompt::marker("🖼️")).unwrap();
        assert_eq!(v, serde_json::json!({"kind": "marker", "text": "🖼️"}));
    }
}
