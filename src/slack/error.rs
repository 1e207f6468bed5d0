use thiserror::Error;

/// Failures raised by the Slack adapter.
///
/// Lookup and API errors always reach the immediate caller. The dispatch loop
/// and the outbound sender are the only places that swallow them.
#[derive(Debug, Error)]
pub enum SlackError {
    /// A strict API call answered `{"ok": false}`.
    #[error("Slack API call to {method} failed: {error}")]
    Api { method: String, error: String },

    #[error("room not found: {0}")]
    RoomNotFound(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(
        "no Slack token configured; set [slack].token in config.toml or SLACKLINE_TOKEN in the environment"
    )]
    MissingToken,

    #[error("couldn't authenticate with Slack. Server said: {0}")]
    Authentication(String),

    #[error("connection failed, invalid token? ({0})")]
    Connection(String),

    /// An event claimed a known `type` but lacked the fields it needs.
    #[error("malformed {kind} event: {reason}")]
    MalformedEvent { kind: String, reason: String },

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl SlackError {
    /// True for errors that must stop the process at startup.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingToken | Self::Authentication(_) | Self::Connection(_)
        )
    }
}

pub type SlackResult<T> = Result<T, SlackError>;
