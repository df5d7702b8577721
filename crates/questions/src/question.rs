//! The `Question` builder and its per-instance progress record.

use std::{
    fmt,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
};

use futures::{FutureExt, future::BoxFuture};

use crate::event::{InboundEvent, Matcher};

/// Side-effecting callback run against an event.
pub type Action<E> = Arc<dyn Fn(Arc<E>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Boolean callback evaluated against an event.
pub type Predicate<E> =
    Arc<dyn Fn(Arc<E>) -> BoxFuture<'static, anyhow::Result<bool>> + Send + Sync>;

pub(crate) fn action<E, F, Fut>(f: F) -> Action<E>
where
    E: InboundEvent,
    F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |event: Arc<E>| f(event).boxed())
}

pub(crate) fn predicate<E, F, Fut>(f: F) -> Predicate<E>
where
    E: InboundEvent,
    F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    Arc::new(move |event: Arc<E>| f(event).boxed())
}

/// How many answers a question collects before it retires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatCount {
    /// Retire after this many accepted answers. Zero is treated as one.
    Times(u32),
    /// Never retire on a count; only `repeat_until` or cancellation ends it.
    Infinite,
}

impl Default for RepeatCount {
    fn default() -> Self {
        Self::Times(1)
    }
}

impl From<u32> for RepeatCount {
    fn from(n: u32) -> Self {
        Self::Times(n)
    }
}

/// Mutable runtime state of one question instance.
///
/// Shared by every clone of the [`Question`] it was created with, so
/// re-registering the same question does not replay its pre-step.
#[derive(Debug, Default)]
pub struct Progress {
    pre_step_done: AtomicBool,
    answered: AtomicU32,
}

impl Progress {
    pub fn pre_step_done(&self) -> bool {
        self.pre_step_done.load(Ordering::Acquire)
    }

    pub fn answered(&self) -> u32 {
        self.answered.load(Ordering::Acquire)
    }

    pub(crate) fn mark_pre_step_done(&self) {
        self.pre_step_done.store(true, Ordering::Release);
    }

    /// Count one accepted answer and return the new total.
    pub(crate) fn record_answer(&self) -> u32 {
        self.answered.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn reset_answers(&self) {
        self.answered.store(0, Ordering::Release);
    }
}

/// One step of a multi-step prompt.
///
/// Built fluently; every setter replaces the previous value for its field.
///
/// ```ignore
/// let name = Question::new("message:text")
///     .pre_step(|ctx| async move { send(&ctx, "What's your name?").await })
///     .answer_handler(|ctx| async move { save_name(&ctx).await });
/// asker.ask(ctx, name).await?;
/// ```
pub struct Question<E> {
    pub(crate) matcher: Matcher,
    pub(crate) pre_step: Option<Action<E>>,
    pub(crate) answer_handler: Option<Action<E>>,
    pub(crate) validation_filter: Option<Predicate<E>>,
    pub(crate) cancel_predicate: Option<Predicate<E>>,
    pub(crate) repeat: RepeatCount,
    pub(crate) repeat_until: Option<Predicate<E>>,
    pub(crate) progress: Arc<Progress>,
}

impl<E> Clone for Question<E> {
    fn clone(&self) -> Self {
        Self {
            matcher: self.matcher.clone(),
            pre_step: self.pre_step.clone(),
            answer_handler: self.answer_handler.clone(),
            validation_filter: self.validation_filter.clone(),
            cancel_predicate: self.cancel_predicate.clone(),
            repeat: self.repeat,
            repeat_until: self.repeat_until.clone(),
            progress: Arc::clone(&self.progress),
        }
    }
}

impl<E> fmt::Debug for Question<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Question")
            .field("matcher", &self.matcher)
            .field("repeat", &self.repeat)
            .field("has_pre_step", &self.pre_step.is_some())
            .field("has_answer_handler", &self.answer_handler.is_some())
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}

impl<E: InboundEvent> Question<E> {
    /// Create a question answered by events carrying any of `matcher`'s tags.
    pub fn new(matcher: impl Into<Matcher>) -> Self {
        Self {
            matcher: matcher.into(),
            pre_step: None,
            answer_handler: None,
            validation_filter: None,
            cancel_predicate: None,
            repeat: RepeatCount::default(),
            repeat_until: None,
            progress: Arc::new(Progress::default()),
        }
    }

    /// Run once before the first answer is awaited, typically to send the prompt.
    pub fn pre_step<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.pre_step = Some(action(f));
        self
    }

    /// Run for every accepted answer.
    pub fn answer_handler<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.answer_handler = Some(action(f));
        self
    }

    /// Events for which `f` returns `false` are not treated as answers.
    pub fn validation_filter<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        self.validation_filter = Some(predicate(f));
        self
    }

    /// When `f` returns `true`, every pending question of the conversation is dropped.
    pub fn cancel_predicate<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        self.cancel_predicate = Some(predicate(f));
        self
    }

    /// Answers required before the question retires. An instance that already
    /// retired starts counting from zero when it is asked again.
    pub fn repeat_count(mut self, count: impl Into<RepeatCount>) -> Self {
        self.repeat = count.into();
        self
    }

    /// Repeat indefinitely; retire on the first matching event for which `f`
    /// returns `true`. That event is not passed to the answer handler.
    pub fn repeat_until<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        self.repeat = RepeatCount::Infinite;
        self.repeat_until = Some(predicate(f));
        self
    }
}

impl<E> Question<E> {
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn repeat(&self) -> RepeatCount {
        self.repeat
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Whether `answered` accepted answers satisfy a finite repeat count.
    pub(crate) fn is_exhausted(&self, answered: u32) -> bool {
        match self.repeat {
            RepeatCount::Times(n) => answered >= n.max(1),
            RepeatCount::Infinite => false,
        }
    }
}

/// One question or an ordered list of them, as accepted by `Asker::ask`.
pub struct QuestionList<E>(pub(crate) Vec<Question<E>>);

impl<E> QuestionList<E> {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<E> From<Question<E>> for QuestionList<E> {
    fn from(question: Question<E>) -> Self {
        Self(vec![question])
    }
}

impl<E> From<Vec<Question<E>>> for QuestionList<E> {
    fn from(questions: Vec<Question<E>>) -> Self {
        Self(questions)
    }
}

impl<E, const N: usize> From<[Question<E>; N]> for QuestionList<E> {
    fn from(questions: [Question<E>; N]) -> Self {
        Self(questions.into())
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::event::ConversationIdentity};

    struct Ping;

    impl InboundEvent for Ping {
        fn has(&self, tag: &str) -> bool {
            tag == "ping"
        }

        fn identity(&self) -> Option<ConversationIdentity> {
            None
        }
    }

    type Q = Question<Ping>;

    #[test]
    fn defaults_to_single_answer() {
        let q = Q::new("ping");
        assert_eq!(q.repeat(), RepeatCount::Times(1));
        assert!(q.answer_handler.is_none());
        assert!(!q.progress().pre_step_done());
        assert_eq!(q.progress().answered(), 0);
    }

    #[test]
    fn repeat_until_overrides_count_and_count_overrides_back() {
        let q = Q::new("ping")
            .repeat_count(3)
            .repeat_until(|_| async { anyhow::Ok(false) });
        assert_eq!(q.repeat(), RepeatCount::Infinite);
        assert!(q.repeat_until.is_some());

        let q = q.repeat_count(2);
        assert_eq!(q.repeat(), RepeatCount::Times(2));
    }

    #[test]
    fn clones_share_progress() {
        let q = Q::new("ping");
        let copy = q.clone();
        copy.progress().mark_pre_step_done();
        assert_eq!(copy.progress().record_answer(), 1);
        assert!(q.progress().pre_step_done());
        assert_eq!(q.progress().answered(), 1);
    }

    #[test]
    fn zero_repeat_count_behaves_like_one() {
        let q = Q::new("ping").repeat_count(0);
        assert!(!q.is_exhausted(0));
        assert!(q.is_exhausted(1));
    }

    #[test]
    fn infinite_never_exhausts() {
        let q = Q::new("ping").repeat_count(RepeatCount::Infinite);
        assert!(!q.is_exhausted(u32::MAX));
    }

    #[test]
    fn single_and_array_normalize_to_lists() {
        assert_eq!(QuestionList::from(Q::new("ping")).len(), 1);
        assert_eq!(QuestionList::from([Q::new("ping"), Q::new("ping")]).len(), 2);
        assert!(QuestionList::<Ping>::from(Vec::new()).is_empty());
    }
}
