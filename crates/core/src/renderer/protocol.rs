//! Line-delimited JSON protocol spoken with the headless renderer.
//!
//! Each request is one JSON object on one line of the worker's stdin;
//! each response is one JSON object on one line of its stdout,
//! carrying the request id it answers. Frame pixels travel base64
//! encoded.

use serde::{Deserialize, Serialize};

use super::error::RenderError;
use super::types::{AnimationInfo, SeekTarget, SessionId};

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum Request<'a> {
    OpenDocument {
        id: u64,
        svg: &'a str,
        width: u32,
        height: u32,
    },
    ListAnimations {
        id: u64,
        session: &'a SessionId,
    },
    Seek {
        id: u64,
        session: &'a SessionId,
        targets: &'a [SeekTarget],
    },
    Capture {
        id: u64,
        session: &'a SessionId,
    },
    CloseSession {
        id: u64,
        session: &'a SessionId,
    },
    Reset {
        id: u64,
    },
    Ping {
        id: u64,
    },
    Shutdown {
        id: u64,
    },
}

impl Request<'_> {
    pub(crate) fn id(&self) -> u64 {
        match self {
            Request::OpenDocument { id, .. }
            | Request::ListAnimations { id, .. }
            | Request::Seek { id, .. }
            | Request::Capture { id, .. }
            | Request::CloseSession { id, .. }
            | Request::Reset { id }
            | Request::Ping { id }
            | Request::Shutdown { id } => *id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub(crate) enum Response {
    Ok {
        id: u64,
        #[serde(default)]
        session: Option<SessionId>,
        #[serde(default)]
        animations: Option<Vec<AnimationInfo>>,
        #[serde(default)]
        frame: Option<FramePayload>,
    },
    Error {
        id: u64,
        code: String,
        message: String,
    },
}

impl Response {
    pub(crate) fn id(&self) -> u64 {
        match self {
            Response::Ok { id, .. } | Response::Error { id, .. } => *id,
        }
    }
}

/// Raw frame as the worker ships it.
#[derive(Debug, Deserialize)]
pub(crate) struct FramePayload {
    pub width: u32,
    pub height: u32,
    /// Base64-encoded straight-alpha RGBA pixels.
    pub rgba: String,
}

/// Map a worker error response into the typed error space.
pub(crate) fn error_from_response(code: &str, message: &str) -> RenderError {
    match code {
        "invalid_input" => RenderError::InvalidInput {
            reason: message.to_string(),
        },
        "session_not_found" => RenderError::SessionNotFound(SessionId(message.to_string())),
        _ => RenderError::RenderFailed {
            reason: format!("{code}: {message}"),
        },
    }
}
