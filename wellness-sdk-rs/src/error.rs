use thiserror::Error;

/// Failures talking to the wellness backend.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status {
        status: u16,
        body: String,
        /// The `error` field of a JSON error body, when the server sent one.
        message: Option<String>,
    },

    #[error("invalid response payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("stream interrupted: {0}")]
    Stream(String),

    #[error("{0}")]
    Validation(String),
}

impl ClientError {
    /// Builds a status error from a non-success response body.
    pub fn from_status(status: u16, body: String) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| {
                value
                    .get("error")
                    .and_then(|error| error.as_str())
                    .filter(|error| !error.is_empty())
                    .map(str::to_string)
            });
        ClientError::Status {
            status,
            body,
            message,
        }
    }

    /// Text fit for showing to the user, when the server supplied one.
    pub fn user_message(&self) -> Option<&str> {
        match self {
            ClientError::Status { message, .. } => message.as_deref(),
            ClientError::Validation(message) => Some(message),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_extracts_server_message() {
        let err = ClientError::from_status(500, r#"{"error":"Agents unavailable"}"#.to_string());
        assert_eq!(err.user_message(), Some("Agents unavailable"));
        assert_eq!(
            err.to_string(),
            r#"server returned 500: {"error":"Agents unavailable"}"#
        );
    }

    #[test]
    fn test_status_error_without_json_body() {
        let err = ClientError::from_status(502, "Bad Gateway".to_string());
        assert_eq!(err.user_message(), None);
    }

    #[test]
    fn test_stream_error_has_no_user_message() {
        assert_eq!(ClientError::Stream("reset".to_string()).user_message(), None);
    }
}
