//! Global rules evaluated before any per-question logic.

use std::{future::Future, sync::Arc};

use crate::{
    config::CancelConfig,
    error::{Error, Result, Stage},
    event::{InboundEvent, Matcher, Pattern},
    question::{Action, Predicate, action, predicate},
};

/// Cancels every pending question of a conversation when it fires.
///
/// The rule only considers events carrying one of its `has` tags. Among
/// those, `hears` patterns decide when set; otherwise the custom `filter`
/// decides; otherwise the tag match alone fires the rule.
pub struct CancelRule<E> {
    has: Matcher,
    hears: Vec<Pattern>,
    filter: Option<Predicate<E>>,
    on_cancel: Option<Action<E>>,
}

impl<E: InboundEvent> CancelRule<E> {
    pub fn new(has: impl Into<Matcher>) -> Self {
        Self {
            has: has.into(),
            hears: Vec::new(),
            filter: None,
            on_cancel: None,
        }
    }

    /// Build the matching part of the rule from configuration.
    pub fn from_config(config: &CancelConfig) -> Result<Self> {
        let mut hears: Vec<Pattern> = config
            .hears
            .iter()
            .map(|s| Pattern::from(s.as_str()))
            .collect();
        for raw in &config.hears_regex {
            hears.push(Pattern::regex(raw)?);
        }
        Ok(Self::new(Matcher::new(config.has.iter().cloned())).hears(hears))
    }

    /// Text patterns that fire the rule. Replaces any previous patterns.
    pub fn hears<I, P>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Pattern>,
    {
        self.hears = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Custom predicate, consulted only when no `hears` patterns are set.
    pub fn filter<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        self.filter = Some(predicate(f));
        self
    }

    /// Run when the rule fires, before the pending questions are dropped.
    pub fn on_cancel<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_cancel = Some(action(f));
        self
    }

    pub fn has(&self) -> &Matcher {
        &self.has
    }

    /// Whether the rule fires for `event`.
    pub async fn fires(&self, event: &Arc<E>) -> Result<bool> {
        if !self.has.matches(event.as_ref()) {
            return Ok(false);
        }
        if !self.hears.is_empty() {
            let Some(text) = event.text() else {
                return Ok(false);
            };
            return Ok(self.hears.iter().any(|p| p.is_match(text)));
        }
        match &self.filter {
            Some(filter) => eval(filter, event, Stage::CancelFilter).await,
            None => Ok(true),
        }
    }

    pub(crate) async fn run_on_cancel(&self, event: &Arc<E>) -> Result<()> {
        match &self.on_cancel {
            Some(on_cancel) => run(on_cancel, event, Stage::OnCancel).await,
            None => Ok(()),
        }
    }
}

pub(crate) async fn eval<E>(check: &Predicate<E>, event: &Arc<E>, stage: Stage) -> Result<bool> {
    check(Arc::clone(event))
        .await
        .map_err(|e| Error::callback(stage, e))
}

pub(crate) async fn run<E>(act: &Action<E>, event: &Arc<E>, stage: Stage) -> Result<()> {
    act(Arc::clone(event))
        .await
        .map_err(|e| Error::callback(stage, e))
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::event::ConversationIdentity,
        std::sync::atomic::{AtomicUsize, Ordering},
    };

    struct Msg {
        tags: Vec<&'static str>,
        text: Option<&'static str>,
    }

    impl InboundEvent for Msg {
        fn has(&self, tag: &str) -> bool {
            self.tags.contains(&tag)
        }

        fn text(&self) -> Option<&str> {
            self.text
        }

        fn identity(&self) -> Option<ConversationIdentity> {
            None
        }
    }

    fn text(t: &'static str) -> Arc<Msg> {
        Arc::new(Msg {
            tags: vec!["message", "message:text"],
            text: Some(t),
        })
    }

    fn button() -> Arc<Msg> {
        Arc::new(Msg {
            tags: vec!["callback_query", "callback_query:data"],
            text: None,
        })
    }

    #[tokio::test]
    async fn hears_takes_precedence_over_filter() {
        let rule = CancelRule::new("message:text")
            .hears(["/cancel"])
            .filter(|_| async { anyhow::Ok(true) });
        assert!(rule.fires(&text("/cancel")).await.unwrap());
        assert!(!rule.fires(&text("hello")).await.unwrap());
    }

    #[tokio::test]
    async fn filter_used_when_no_patterns() {
        let rule = CancelRule::new("message:text")
            .filter(|ev: Arc<Msg>| async move { anyhow::Ok(ev.text == Some("stop")) });
        assert!(rule.fires(&text("stop")).await.unwrap());
        assert!(!rule.fires(&text("go")).await.unwrap());
    }

    #[tokio::test]
    async fn bare_tag_match_is_enough() {
        let rule = CancelRule::new("callback_query");
        assert!(rule.fires(&button()).await.unwrap());
        assert!(!rule.fires(&text("anything")).await.unwrap());
    }

    #[tokio::test]
    async fn hears_ignores_events_without_text() {
        let rule = CancelRule::new("callback_query").hears(["/cancel"]);
        assert!(!rule.fires(&button()).await.unwrap());
    }

    #[tokio::test]
    async fn filter_errors_carry_stage() {
        let rule = CancelRule::new("message")
            .filter(|_| async { Err::<bool, _>(anyhow::anyhow!("nope")) });
        let err = rule.fires(&text("x")).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::CancelFilter));
    }

    #[tokio::test]
    async fn on_cancel_runs_when_set() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let rule = CancelRule::new("message").on_cancel(move |_| {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(())
            }
        });
        rule.run_on_cancel(&text("/cancel")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn from_config_compiles_patterns() {
        let cfg = CancelConfig {
            has: vec!["message:text".into()],
            hears: vec!["/cancel".into()],
            hears_regex: vec!["(?i)^stop$".into()],
        };
        let rule = CancelRule::<Msg>::from_config(&cfg).unwrap();
        assert_eq!(rule.has().tags(), ["message:text"]);
        assert_eq!(rule.hears.len(), 2);
    }

    #[test]
    fn from_config_rejects_bad_regex() {
        let cfg = CancelConfig {
            hears_regex: vec!["[".into()],
            ..Default::default()
        };
        assert!(matches!(
            CancelRule::<Msg>::from_config(&cfg),
            Err(Error::InvalidPattern { .. })
        ));
    }
}
