//! Registration and the per-event decision procedure.
//!
//! Events for the same conversation key are serialized: a per-key async lock
//! is held from the first look at the pending queue until the last callback
//! of that event has returned. Different keys proceed in parallel.
//!
//! `ask` and `cancel` do not take that lock, so callbacks may call them to
//! register follow-up questions or to abort the conversation. After a
//! callback returns, the engine only retires or clears the queue if the
//! question it was evaluating is still at its head.

use std::{future::Future, sync::Arc};

use {
    dashmap::DashMap,
    tokio::sync::{Mutex, OwnedMutexGuard},
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use {crate::metrics_names::questions as q_metrics, metrics::counter};

use crate::{
    config::AskerConfig,
    error::{Error, Result, Stage},
    event::{InboundEvent, KeyFn},
    question::{Predicate, Question, QuestionList, RepeatCount, predicate},
    rules::{CancelRule, eval, run},
    store::{InMemoryPendingStore, PendingStore},
};

/// What the decision procedure did with one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing pending, admission declined, or the head question does not match.
    PassThrough,
    /// The head question matched but its validation filter declined.
    Filtered,
    /// The global cancel rule fired; every pending question was dropped.
    GlobalCancel,
    /// The head question's cancel predicate fired; every pending question was dropped.
    Cancelled,
    /// `repeat_until` fired; the head question retired without an answer.
    RepeatStopped,
    /// The answer handler ran. `retired` is set when the question left the queue.
    Answered { retired: bool },
}

impl Outcome {
    /// Whether the event was consumed and should not reach later handlers.
    pub fn is_consumed(&self) -> bool {
        !matches!(self, Self::PassThrough | Self::Filtered)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PassThrough => "pass_through",
            Self::Filtered => "filtered",
            Self::GlobalCancel => "global_cancel",
            Self::Cancelled => "cancelled",
            Self::RepeatStopped => "repeat_stopped",
            Self::Answered { retired: false } => "answered",
            Self::Answered { retired: true } => "answered_retired",
        }
    }
}

// ── Per-key locks ───────────────────────────────────────────────────────────

#[derive(Default)]
struct KeyLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyLocks {
    async fn acquire(&self, key: &str) -> KeyGuard<'_> {
        let lock = Arc::clone(self.locks.entry(key.to_string()).or_default().value());
        let guard = lock.lock_owned().await;
        KeyGuard {
            locks: &self.locks,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}

/// Releases the key lock on drop and forgets the lock once nobody waits on it.
struct KeyGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Clones are only made under the map's shard lock, so a count of one
        // means no other task holds or awaits this mutex.
        self.locks
            .remove_if(self.key.as_str(), |_, lock| Arc::strong_count(lock) == 1);
    }
}

// ── Asker ───────────────────────────────────────────────────────────────────

/// Drives sequential questions for every conversation.
pub struct Asker<E> {
    store: Arc<dyn PendingStore<E>>,
    cancel_rule: Option<CancelRule<E>>,
    admission: Option<Predicate<E>>,
    key_fn: Option<KeyFn<E>>,
    locks: KeyLocks,
}

impl<E: InboundEvent> Default for Asker<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: InboundEvent> Asker<E> {
    /// An asker with an in-memory store and no global rules.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> AskerBuilder<E> {
        AskerBuilder::default()
    }

    pub fn store(&self) -> &Arc<dyn PendingStore<E>> {
        &self.store
    }

    /// Conversation key of `event`: the custom key function when configured,
    /// otherwise the default `<bot>-<user>-<chat>` formula.
    pub fn key_for(&self, event: &E) -> Option<String> {
        match &self.key_fn {
            Some(key_fn) => key_fn(event),
            None => event.identity().map(|id| id.key()),
        }
    }

    /// Number of questions pending for `key`.
    pub fn pending(&self, key: &str) -> usize {
        self.store.pending(key)
    }

    /// Ask one question, or an ordered list of them, in `ctx`'s conversation.
    ///
    /// The first question's pre-step runs before this returns; later
    /// questions run theirs when they first receive an answer. Anything
    /// already pending for the conversation is discarded.
    pub async fn ask(&self, ctx: Arc<E>, questions: impl Into<QuestionList<E>>) -> Result<()> {
        let key = self.key_for(&ctx).ok_or(Error::NoConversationKey)?;
        self.ask_key(&key, ctx, questions).await
    }

    /// [`ask`](Self::ask) with an explicit conversation key.
    pub async fn ask_key(
        &self,
        key: &str,
        ctx: Arc<E>,
        questions: impl Into<QuestionList<E>>,
    ) -> Result<()> {
        let QuestionList(questions) = questions.into();

        if let Some(first) = questions.first()
            && !first.progress.pre_step_done()
        {
            if let Some(pre_step) = &first.pre_step {
                run(pre_step, &ctx, Stage::PreStep).await.inspect_err(|e| {
                    warn!(key, stage = Stage::PreStep.as_str(), error = %e, "question callback failed");
                })?;
            }
            first.progress.mark_pre_step_done();
        }

        for question in &questions {
            if question.is_exhausted(question.progress.answered()) {
                question.progress.reset_answers();
            }
        }

        let replaced = self.store.pending(key);
        if replaced > 0 {
            debug!(key, replaced, "discarding previously pending questions");
        }
        let count = questions.len();
        self.store.install(key, questions);
        debug!(key, count, "questions registered");

        #[cfg(feature = "metrics")]
        counter!(q_metrics::ASKED_TOTAL).increment(1);

        Ok(())
    }

    /// Drop everything pending in `ctx`'s conversation.
    pub fn cancel(&self, ctx: &E) -> bool {
        self.key_for(ctx).is_some_and(|key| self.cancel_key(&key))
    }

    /// Drop everything pending for `key`. Returns whether anything was pending.
    pub fn cancel_key(&self, key: &str) -> bool {
        let cleared = self.store.clear(key);
        if cleared {
            info!(key, "pending questions cancelled");
            #[cfg(feature = "metrics")]
            counter!(q_metrics::CANCELLED_TOTAL, "scope" => "manual").increment(1);
        }
        cleared
    }

    /// Run the decision procedure for one inbound event.
    pub async fn handle(&self, event: Arc<E>) -> Result<Outcome> {
        match self.key_for(&event) {
            Some(key) => self.handle_key(&key, event).await,
            None => Ok(Outcome::PassThrough),
        }
    }

    /// [`handle`](Self::handle) with an explicit conversation key.
    pub async fn handle_key(&self, key: &str, event: Arc<E>) -> Result<Outcome> {
        if self.store.pending(key) == 0 {
            return Ok(Outcome::PassThrough);
        }

        let _guard = self.locks.acquire(key).await;
        let result = self.decide(key, &event).await;

        match &result {
            Ok(outcome) => {
                debug!(key, outcome = outcome.as_str(), "event decided");
                #[cfg(feature = "metrics")]
                record_outcome(outcome);
            },
            Err(e) => {
                warn!(key, stage = e.stage().map(|s| s.as_str()), error = %e, "question callback failed");
                #[cfg(feature = "metrics")]
                record_error(e);
            },
        }
        result
    }

    /// Run the decision procedure and hand unconsumed events to `next`.
    pub async fn middleware<F, Fut>(&self, event: Arc<E>, next: F) -> Result<Outcome>
    where
        F: FnOnce(Arc<E>) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let outcome = self.handle(Arc::clone(&event)).await?;
        if !outcome.is_consumed() {
            next(event).await.map_err(Error::downstream)?;
        }
        Ok(outcome)
    }

    async fn decide(&self, key: &str, event: &Arc<E>) -> Result<Outcome> {
        let Some(head) = self.store.peek_head(key) else {
            return Ok(Outcome::PassThrough);
        };

        if let Some(rule) = &self.cancel_rule
            && rule.fires(event).await?
        {
            rule.run_on_cancel(event).await?;
            self.drop_pending(key, &head);
            info!(key, "pending questions cancelled by global rule");
            return Ok(Outcome::GlobalCancel);
        }

        if let Some(admission) = &self.admission
            && !eval(admission, event, Stage::Admission).await?
        {
            return Ok(Outcome::PassThrough);
        }

        if !head.matcher.matches(event.as_ref()) {
            return Ok(Outcome::PassThrough);
        }

        if let Some(cancel) = &head.cancel_predicate
            && eval(cancel, event, Stage::CancelPredicate).await?
        {
            self.drop_pending(key, &head);
            info!(key, "pending questions cancelled by question");
            return Ok(Outcome::Cancelled);
        }

        if head.repeat == RepeatCount::Infinite
            && let Some(until) = &head.repeat_until
            && eval(until, event, Stage::RepeatUntil).await?
        {
            self.retire(key, &head);
            return Ok(Outcome::RepeatStopped);
        }

        if let Some(filter) = &head.validation_filter
            && !eval(filter, event, Stage::ValidationFilter).await?
        {
            return Ok(Outcome::Filtered);
        }

        if !head.progress.pre_step_done() {
            if let Some(pre_step) = &head.pre_step {
                run(pre_step, event, Stage::PreStep).await?;
            }
            head.progress.mark_pre_step_done();
        }

        let handler = head
            .answer_handler
            .as_ref()
            .ok_or(Error::MissingAnswerHandler)?;
        run(handler, event, Stage::Answer).await?;

        let answered = head.progress.record_answer();
        let retired = head.is_exhausted(answered) && self.retire(key, &head);
        Ok(Outcome::Answered { retired })
    }

    /// Whether `question` is still the head of `key`'s queue.
    fn is_head(&self, key: &str, question: &Question<E>) -> bool {
        self.store
            .peek_head(key)
            .is_some_and(|current| Arc::ptr_eq(&current.progress, &question.progress))
    }

    fn retire(&self, key: &str, question: &Question<E>) -> bool {
        if !self.is_head(key, question) {
            debug!(key, "question replaced during callback, not retiring");
            return false;
        }
        let remaining = self.store.advance(key);
        debug!(key, remaining, "question retired");
        true
    }

    fn drop_pending(&self, key: &str, question: &Question<E>) {
        if self.is_head(key, question) {
            self.store.clear(key);
        }
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(feature = "metrics")]
fn record_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Answered { retired } => {
            counter!(q_metrics::ANSWERED_TOTAL).increment(1);
            if *retired {
                counter!(q_metrics::RETIRED_TOTAL).increment(1);
            }
        },
        Outcome::RepeatStopped => counter!(q_metrics::RETIRED_TOTAL).increment(1),
        Outcome::GlobalCancel => {
            counter!(q_metrics::CANCELLED_TOTAL, "scope" => "global").increment(1)
        },
        Outcome::Cancelled => {
            counter!(q_metrics::CANCELLED_TOTAL, "scope" => "question").increment(1)
        },
        Outcome::Filtered => counter!(q_metrics::FILTERED_TOTAL).increment(1),
        Outcome::PassThrough => {},
    }
}

#[cfg(feature = "metrics")]
fn record_error(error: &Error) {
    if let Some(stage) = error.stage() {
        counter!(q_metrics::CALLBACK_ERRORS_TOTAL, "stage" => stage.as_str()).increment(1);
    }
}

// ── Builder ─────────────────────────────────────────────────────────────────

/// Configures the global behaviour of an [`Asker`].
pub struct AskerBuilder<E> {
    store: Option<Arc<dyn PendingStore<E>>>,
    cancel_rule: Option<CancelRule<E>>,
    admission: Option<Predicate<E>>,
    key_fn: Option<KeyFn<E>>,
}

impl<E> Default for AskerBuilder<E> {
    fn default() -> Self {
        Self {
            store: None,
            cancel_rule: None,
            admission: None,
            key_fn: None,
        }
    }
}

impl<E: InboundEvent> AskerBuilder<E> {
    /// Use `store` instead of the default in-memory store.
    pub fn store(mut self, store: Arc<dyn PendingStore<E>>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn cancel_rule(mut self, rule: CancelRule<E>) -> Self {
        self.cancel_rule = Some(rule);
        self
    }

    /// Apply the declarative parts of `config`.
    pub fn config(mut self, config: &AskerConfig) -> Result<Self> {
        if let Some(cancel) = &config.cancel {
            self.cancel_rule = Some(CancelRule::from_config(cancel)?);
        }
        Ok(self)
    }

    /// Admission filter: events for which `f` returns `false` pass through
    /// before any question logic runs. The global cancel rule is checked
    /// first and still fires for rejected events.
    pub fn filter<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        self.admission = Some(predicate(f));
        self
    }

    /// Derive conversation keys with `f` instead of the default formula.
    pub fn key_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&E) -> Option<String> + Send + Sync + 'static,
    {
        self.key_fn = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Asker<E> {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryPendingStore::new()));
        Asker {
            store,
            cancel_rule: self.cancel_rule,
            admission: self.admission,
            key_fn: self.key_fn,
            locks: KeyLocks::default(),
        }
    }
}
