//! Telegram adapter for promptline.
//!
//! Wraps teloxide updates as [`InboundEvent`](promptline_questions::InboundEvent)s
//! and runs them through an [`Asker`](promptline_questions::Asker) so a bot can
//! ask a user a sequence of questions and receive the answers in order.

pub mod bot;
pub mod config;
pub mod error;
pub mod event;
pub mod handlers;

pub use {
    bot::{build_asker, start_polling},
    config::TelegramConfig,
    error::{Error, Result},
    event::TelegramEvent,
    handlers::{QuestionRouter, UpdateHandler},
};
