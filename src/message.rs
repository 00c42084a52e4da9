//! Request and response bodies of the HTTP surface.

use crate::selection::SelectionSpan;
use serde::{Deserialize, Serialize};

/// Routes served by the HTTP receptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// `POST /api/fix`
    Fix,
    /// `POST /api/cancel`
    Cancel,
    /// `POST /api/edit`
    Edit,
    /// `GET /api/doc`
    Doc,
}

impl Endpoint {
    /// Map a request method and url to an endpoint. Query strings are
    /// ignored.
    pub fn route(method: &str, url: &str) -> Option<Endpoint> {
        let path = url.split('?').next().unwrap_or(url);
        match (method, path) {
            ("POST", "/api/fix") => Some(Endpoint::Fix),
            ("POST", "/api/cancel") => Some(Endpoint::Cancel),
            ("POST", "/api/edit") => Some(Endpoint::Edit),
            ("GET", "/api/doc") => Some(Endpoint::Doc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Fix => "fix",
            Endpoint::Cancel => "cancel",
            Endpoint::Edit => "edit",
            Endpoint::Doc => "doc",
        }
    }
}

/// Body of fix and edit requests.
#[derive(Debug, Eq, PartialEq, Clone, Deserialize, Serialize)]
pub struct TextParams {
    pub text: String,
    /// Target document, the configured default if absent.
    #[serde(default)]
    pub doc: Option<String>,
}

/// Body of cancel requests. Empty bodies are fine.
#[derive(Debug, Eq, PartialEq, Clone, Default, Deserialize, Serialize)]
pub struct DocParams {
    #[serde(default)]
    pub doc: Option<String>,
}

impl DocParams {
    /// Parse the target document out of any request body. Bodies that
    /// aren't JSON objects target the default document.
    pub fn from_body(body: &str) -> DocParams {
        serde_json::from_str(body).unwrap_or_default()
    }
}

#[derive(Debug, Eq, PartialEq, Clone, Deserialize, Serialize)]
pub struct SuccessResp {
    pub success: bool,
}

#[derive(Debug, Eq, PartialEq, Clone, Deserialize, Serialize)]
pub struct DocResp {
    pub text: String,
    /// Whether a correction is being fetched or replayed.
    pub active: bool,
    /// Where the correction actor's highlight currently is.
    pub selection: Option<SelectionSpan>,
}
