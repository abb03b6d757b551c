use thiserror::Error;

/// Every failure the control point can report.
///
/// Whatever the origin (gateway, device, playlist policy), a failure is
/// turned into a single human readable [`summary`](ControlError::summary)
/// before it reaches the display layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("No connected device")]
    NoDevice,
    /// The gateway could not be reached or answered something unreadable.
    #[error("{kind}:{message}")]
    Transport { kind: String, message: String },
    /// The gateway answered with an unexpected HTTP status.
    #[error("{status} {reason}")]
    HttpStatus { status: u16, reason: String },
    /// The gateway reached the device but the device refused the command.
    #[error("Device rejected command ({status_code}): {message}")]
    Rejected { status_code: i64, message: String },
    #[error("Disconnected from remote event source")]
    Disconnected,
    #[error("Invalid gateway payload: {0}")]
    Decode(String),
    #[error("Already in playlist: {0}")]
    AlreadyQueued(String),
    #[error("Cannot remove the currently playing item (index {0})")]
    ItemActive(usize),
    #[error("Playlist index out of bound {index} >= {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("No next media in playlist")]
    NoNextMedia,
    #[error("No previous media in playlist")]
    NoPreviousMedia,
}

impl ControlError {
    pub fn transport(kind: &str, message: impl Into<String>) -> Self {
        ControlError::Transport {
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        ControlError::Decode(message.into())
    }

    /// Normalized one-line description used on the failure channel.
    pub fn summary(&self) -> String {
        self.to_string()
    }

    /// True for failures raised by a remote exchange, as opposed to local
    /// policy checks made before anything is sent.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            ControlError::Transport { .. }
                | ControlError::HttpStatus { .. }
                | ControlError::Rejected { .. }
                | ControlError::Decode(_)
        )
    }
}

impl From<reqwest::Error> for ControlError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            "TimeoutError"
        } else if err.is_connect() {
            "ConnectError"
        } else if err.is_decode() {
            "DecodeError"
        } else if err.is_body() {
            "BodyError"
        } else {
            "RequestError"
        };
        ControlError::transport(kind, err.to_string())
    }
}

impl From<serde_json::Error> for ControlError {
    fn from(err: serde_json::Error) -> Self {
        ControlError::decode(err.to_string())
    }
}
