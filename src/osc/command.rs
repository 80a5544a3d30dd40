use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::types::ApiLevel;

pub(crate) const EXECUTE_PATH: &str = "/osc/commands/execute";

/// Largest error document read from a failed preview request.
pub(crate) const MAX_ERROR_BODY: usize = 4096;

/// Build the command endpoint for `host`, rejecting anything that is not a
/// bare host or `host:port`.
pub(crate) fn execute_url(host: &str) -> Result<Url> {
    let invalid = || Error::InvalidHost(host.to_owned());
    if host.is_empty() || host.contains(|c: char| c.is_whitespace()) {
        return Err(invalid());
    }
    let url = Url::parse(&format!("http://{host}{EXECUTE_PATH}")).map_err(|_| invalid())?;
    let bare = url.host_str().is_some_and(|h| !h.is_empty())
        && url.path() == EXECUTE_PATH
        && url.query().is_none()
        && url.fragment().is_none()
        && url.username().is_empty()
        && url.password().is_none();
    if bare { Ok(url) } else { Err(invalid()) }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(crate) struct Command<'a> {
    name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Parameters<'a>>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
struct Parameters<'a> {
    session_id: &'a str,
}

/// The live preview command for the resolved API level.
pub(crate) fn live_preview(level: ApiLevel, session_id: Option<&str>) -> Command<'_> {
    match level.resolve(session_id) {
        ApiLevel::V2_0 => Command {
            name: "camera._getLivePreview",
            parameters: session_id.map(|session_id| Parameters { session_id }),
        },
        ApiLevel::V2_1 | ApiLevel::Auto => Command {
            name: "camera.getLivePreview",
            parameters: None,
        },
    }
}

#[derive(Deserialize)]
struct ErrorDocument {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// Turn a non-success response into [`Error::Status`], pulling the OSC
/// error code and message out of the body when it is a JSON error document.
pub(crate) fn status_error(status: u16, body: &[u8]) -> Error {
    let (code, message) = match serde_json::from_slice::<ErrorDocument>(body) {
        Ok(ErrorDocument { error: Some(err) }) => (err.code, err.message),
        _ => (None, None),
    };
    let message = message.unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_owned());
    Error::Status {
        status,
        code,
        message,
    }
}
