use std::{error::Error as StdError, fmt};

/// Crate-wide result type for question operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The user callback that was running when a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Admission,
    CancelFilter,
    OnCancel,
    CancelPredicate,
    RepeatUntil,
    ValidationFilter,
    PreStep,
    Answer,
}

impl Stage {
    /// Stable snake_case name, used as a log field and metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admission => "admission",
            Self::CancelFilter => "cancel_filter",
            Self::OnCancel => "on_cancel",
            Self::CancelPredicate => "cancel_predicate",
            Self::RepeatUntil => "repeat_until",
            Self::ValidationFilter => "validation_filter",
            Self::PreStep => "pre_step",
            Self::Answer => "answer",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Admission => "admission filter",
            Self::CancelFilter => "cancel filter",
            Self::OnCancel => "on_cancel",
            Self::CancelPredicate => "cancel predicate",
            Self::RepeatUntil => "repeat_until",
            Self::ValidationFilter => "validation filter",
            Self::PreStep => "pre_step",
            Self::Answer => "answer handler",
        };
        f.write_str(name)
    }
}

/// Typed errors surfaced by registration and event handling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The head question matched an answer but has no handler configured.
    #[error("question matched an answer but has no answer handler")]
    MissingAnswerHandler,

    /// The event carries no identity from which a conversation key can be built.
    #[error("no conversation key could be derived from the event")]
    NoConversationKey,

    /// A user-supplied callback failed.
    #[error("{stage} failed: {source}")]
    Callback {
        stage: Stage,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The pass-through continuation failed.
    #[error("downstream handler failed: {source}")]
    Downstream {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// A `hears` pattern is not a valid regular expression.
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn callback(stage: Stage, source: anyhow::Error) -> Self {
        Self::Callback {
            stage,
            source: source.into(),
        }
    }

    #[must_use]
    pub fn downstream(source: anyhow::Error) -> Self {
        Self::Downstream {
            source: source.into(),
        }
    }

    #[must_use]
    pub fn invalid_pattern(pattern: impl Into<String>, source: regex::Error) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            source,
        }
    }

    /// Stage of the failing callback, if this error came from one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Callback { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_error_keeps_stage_and_message() {
        let err = Error::callback(Stage::Answer, anyhow::anyhow!("boom"));
        assert_eq!(err.stage(), Some(Stage::Answer));
        assert_eq!(err.to_string(), "answer handler failed: boom");
        assert!(StdError::source(&err).is_some());
    }

    #[test]
    fn non_callback_errors_have_no_stage() {
        assert_eq!(Error::MissingAnswerHandler.stage(), None);
        assert_eq!(Error::NoConversationKey.stage(), None);
    }
}
