//! Declarative configuration for the global rules of an [`Asker`](crate::Asker).
//!
//! Callbacks cannot be expressed in a file, so only the matching half of the
//! cancel rule lives here; `on_cancel` and custom filters are attached in code
//! after [`CancelRule::from_config`](crate::CancelRule::from_config).
//!
//! ```toml
//! [cancel]
//! has = ["message:text"]
//! hears = ["/cancel"]
//! hears_regex = ["(?i)^stop$"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AskerConfig {
    /// Global cancel rule. Absent means no global cancel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel: Option<CancelConfig>,
}

/// Matching half of the global cancel rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CancelConfig {
    /// Tags an event must carry for the rule to be considered.
    pub has: Vec<String>,

    /// Exact phrases that cancel.
    pub hears: Vec<String>,

    /// Regular expressions that cancel.
    pub hears_regex: Vec<String>,
}

impl Default for CancelConfig {
    fn default() -> Self {
        Self {
            has: vec!["message:text".into()],
            hears: Vec::new(),
            hears_regex: Vec::new(),
        }
    }
}

impl AskerConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Load from a `.toml` or `.json` file, chosen by extension (TOML otherwise).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&raw)?,
            _ => Self::from_toml_str(&raw)?,
        };
        tracing::debug!(path = %path.display(), cancel = config.cancel.is_some(), "loaded asker config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::io::Write};

    #[test]
    fn empty_config_has_no_cancel_rule() {
        let cfg = AskerConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, AskerConfig::default());
        assert!(cfg.cancel.is_none());
    }

    #[test]
    fn cancel_section_fills_defaults() {
        let cfg = AskerConfig::from_toml_str("[cancel]\nhears = [\"/cancel\"]\n").unwrap();
        let cancel = cfg.cancel.unwrap();
        assert_eq!(cancel.has, vec!["message:text"]);
        assert_eq!(cancel.hears, vec!["/cancel"]);
        assert!(cancel.hears_regex.is_empty());
    }

    #[test]
    fn json_config() {
        let cfg = AskerConfig::from_json_str(
            r#"{ "cancel": { "has": ["message", "callback_query:data"], "hears_regex": ["^stop"] } }"#,
        )
        .unwrap();
        let cancel = cfg.cancel.unwrap();
        assert_eq!(cancel.has, vec!["message", "callback_query:data"]);
        assert_eq!(cancel.hears_regex, vec!["^stop"]);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(AskerConfig::from_toml_str("[cancel\n").is_err());
    }

    #[test]
    fn load_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("asker.toml");
        let mut f = std::fs::File::create(&toml_path).unwrap();
        writeln!(f, "[cancel]\nhears = [\"/quit\"]").unwrap();
        let cfg = AskerConfig::load(&toml_path).unwrap();
        assert_eq!(cfg.cancel.unwrap().hears, vec!["/quit"]);

        let json_path = dir.path().join("asker.json");
        std::fs::write(&json_path, r#"{"cancel":{"hears":["/stop"]}}"#).unwrap();
        let cfg = AskerConfig::load(&json_path).unwrap();
        assert_eq!(cfg.cancel.unwrap().hears, vec!["/stop"]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = AskerConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, crate::Error::Io(_)));
    }
}
