use {
    promptline_questions::AskerConfig,
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Configuration for a Telegram bot driven by the question engine.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// Long-polling timeout passed to `getUpdates` (seconds).
    pub poll_timeout_secs: u32,

    /// Delay before retrying a failed `getUpdates` call (seconds).
    pub retry_delay_secs: u64,

    /// Global question rules (cancel phrases).
    pub questions: AskerConfig,
}

impl TelegramConfig {
    /// HTTP client timeout. Must outlast the long poll or the client aborts
    /// before Telegram answers.
    pub fn client_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.poll_timeout_secs) + 15)
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("questions", &self.questions)
            .finish_non_exhaustive()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            poll_timeout_secs: 30,
            retry_delay_secs: 5,
            questions: AskerConfig::default(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let cfg = TelegramConfig::default();
        assert_eq!(cfg.poll_timeout_secs, 30);
        assert_eq!(cfg.retry_delay_secs, 5);
        assert!(cfg.questions.cancel.is_none());
        assert_eq!(cfg.client_timeout().as_secs(), 45);
    }

    #[test]
    fn deserialize_from_json() {
        let json = r#"{
            "token": "123:ABC",
            "poll_timeout_secs": 10,
            "questions": { "cancel": { "hears": ["/cancel"] } }
        }"#;
        let cfg: TelegramConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.token.expose_secret(), "123:ABC");
        assert_eq!(cfg.poll_timeout_secs, 10);
        let cancel = cfg.questions.cancel.unwrap();
        assert_eq!(cancel.hears, vec!["/cancel"]);
        // defaults for unspecified fields
        assert_eq!(cancel.has, vec!["message:text"]);
        assert_eq!(cfg.retry_delay_secs, 5);
    }

    #[test]
    fn debug_redacts_token() {
        let cfg = TelegramConfig {
            token: Secret::new("secret-token".into()),
            ..Default::default()
        };
        let rendered = format!("{cfg:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("secret-token"));
    }

    #[test]
    fn serialize_roundtrip() {
        let cfg = TelegramConfig {
            token: Secret::new("tok".into()),
            retry_delay_secs: 1,
            ..Default::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: TelegramConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg2.retry_delay_secs, 1);
        assert_eq!(cfg2.token.expose_secret(), "tok");
    }
}
