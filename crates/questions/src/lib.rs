//! Sequential questions for chat bots.
//!
//! A conversation registers an ordered list of [`Question`]s with
//! [`Asker::ask`]. Every inbound event is then passed to [`Asker::handle`],
//! which decides whether it answers the question at the head of the queue,
//! cancels the conversation, is rejected by a validation filter, or passes
//! through to the rest of the host's handlers.

pub mod asker;
pub mod config;
pub mod error;
pub mod event;
pub mod metrics_names;
pub mod question;
pub mod rules;
pub mod store;

pub use {
    asker::{Asker, AskerBuilder, Outcome},
    config::{AskerConfig, CancelConfig},
    error::{Error, Result, Stage},
    event::{ConversationIdentity, InboundEvent, KeyFn, Matcher, Pattern},
    question::{Action, Predicate, Progress, Question, QuestionList, RepeatCount},
    rules::CancelRule,
    store::{InMemoryPendingStore, PendingStore},
};
