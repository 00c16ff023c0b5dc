#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// Non-2xx response. `message` is the backend's `{message}` body field
    /// when one was sent, so callers can match on the backend's own error
    /// phrases; Display deliberately shows nothing but the message.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("could not reach server: {0}")]
    Network(String),

    #[error("could not parse server response: {0}")]
    BadBody(String),
}

impl Error {
    pub fn api(status: u16, message: impl Into<String>) -> Error {
        Error::Api {
            status,
            message: message.into(),
        }
    }

    /// Builds the error for a non-2xx response, pulling `message` out of
    /// the JSON body when there is one.
    pub fn from_response(status: u16, path: &str, body: &[u8]) -> Error {
        let message = serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or_else(|| format!("HTTP {status} on {path}"));
        Error::Api { status, message }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
