use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Direction of a single piece of feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sign {
    Positive,
    Negative,
}

impl Sign {
    /// Raw wire value of a positive feedback event.
    pub const POSITIVE_VALUE: i64 = 1;
    /// Raw wire value of a negative feedback event.
    pub const NEGATIVE_VALUE: i64 = -1;

    /// Interpret the integer `feedback` field of a [`FeedbackEvent`].
    ///
    /// # Errors
    ///
    /// Returns [`AuraError::InvalidFeedbackValue`] for anything other than
    /// `1` or `-1`.
    pub fn from_value(value: i64) -> Result<Self, AuraError> {
        match value {
            Self::POSITIVE_VALUE => Ok(Sign::Positive),
            Self::NEGATIVE_VALUE => Ok(Sign::Negative),
            other => Err(AuraError::InvalidFeedbackValue(other)),
        }
    }

    /// Apply a weighted step in this direction to `score`, saturating at the
    /// `i64` bounds.
    pub fn apply(self, score: i64, weight: i64) -> i64 {
        match self {
            Sign::Positive => score.saturating_add(weight),
            Sign::Negative => score.saturating_sub(weight),
        }
    }
}

/// One client-reported observation, as carried in the `behavior` field of a
/// `feedback` message.
///
/// `id` and `device` are kept for audit logging only; aggregation is keyed
/// on `action` alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    /// Originating user or session, e.g. `"user_3"`.
    #[serde(default)]
    pub id: String,
    pub action: String,
    /// `1` for positive, `-1` for negative. See [`Sign::from_value`].
    #[serde(default)]
    pub feedback: i64,
    /// Free-form device tag, e.g. `"mobile"`.
    #[serde(default)]
    pub device: String,
}

impl FeedbackEvent {
    /// Typed sign of this event.
    pub fn sign(&self) -> Result<Sign, AuraError> {
        Sign::from_value(self.feedback)
    }
}

/// Kind of an inbound client message (`messageType` on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Feedback,
    Retrieve,
    /// Any kind the server does not recognise, including a missing field.
    #[default]
    #[serde(other)]
    Unknown,
}

/// Envelope of every client → server message.
///
/// `behavior` is left undecoded so that a malformed payload can be reported
/// separately from a malformed envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMessage {
    #[serde(rename = "messageType", default, deserialize_with = "kind_or_unknown")]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<serde_json::Value>,
}

/// Any `messageType` that is not one of the known strings (a number, `null`,
/// an object) is [`MessageKind::Unknown`] rather than a decode error.
fn kind_or_unknown<'de, D>(deserializer: D) -> Result<MessageKind, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(MessageKind::deserialize(raw).unwrap_or_default())
}

/// Text sent back to the client for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Feedback was accepted.
    Ack,
    /// Full score table, already encoded as JSON.
    Scores(String),
    /// The message kind was not recognised.
    Unknown,
    /// The message or its payload could not be decoded.
    Error(String),
}

impl Reply {
    pub const ACK_TEXT: &'static str = "Feedback processed successfully";
    pub const UNKNOWN_TEXT: &'static str = "Unknown message type";

    /// Wire text of this reply.
    pub fn into_text(self) -> String {
        match self {
            Reply::Ack => Self::ACK_TEXT.to_string(),
            Reply::Scores(json) => json,
            Reply::Unknown => Self::UNKNOWN_TEXT.to_string(),
            Reply::Error(message) => message,
        }
    }
}

/// Error taxonomy shared by every AURA crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuraError {
    #[error("Decode Error: {0}")]
    Decode(String),

    #[error("Connection Error: {0}")]
    Connection(String),

    #[error("Persistence Write Error: {0}")]
    PersistenceWrite(String),

    #[error("Invalid Feedback Value: {0} (expected 1 or -1)")]
    InvalidFeedbackValue(i64),

    #[error("I/O Error: {0}")]
    Io(String),

    #[error("Bind Error: {0}")]
    Bind(String),

    #[error("Config Error: {0}")]
    Config(String),
}
