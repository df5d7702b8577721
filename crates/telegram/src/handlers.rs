use std::sync::Arc;

use {
    async_trait::async_trait,
    teloxide::types::{Update, UserId},
    tracing::debug,
};

use promptline_questions::{Asker, Outcome};

use crate::{error::Result, event::TelegramEvent};

/// Receives updates that no pending question consumed.
#[async_trait]
pub trait UpdateHandler: Send + Sync {
    async fn handle(&self, event: Arc<TelegramEvent>) -> anyhow::Result<()>;
}

/// Routes Telegram updates through an [`Asker`] before the bot's own handler.
pub struct QuestionRouter {
    asker: Arc<Asker<TelegramEvent>>,
    bot_id: UserId,
    fallback: Option<Arc<dyn UpdateHandler>>,
}

impl QuestionRouter {
    pub fn new(asker: Arc<Asker<TelegramEvent>>, bot_id: UserId) -> Self {
        Self {
            asker,
            bot_id,
            fallback: None,
        }
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: Arc<dyn UpdateHandler>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn asker(&self) -> &Arc<Asker<TelegramEvent>> {
        &self.asker
    }

    pub fn bot_id(&self) -> UserId {
        self.bot_id
    }

    /// Wrap `update` and run it through the question middleware.
    pub async fn route(&self, update: Update) -> Result<Outcome> {
        self.route_event(Arc::new(TelegramEvent::new(self.bot_id, update)))
            .await
    }

    pub async fn route_event(&self, event: Arc<TelegramEvent>) -> Result<Outcome> {
        let fallback = self.fallback.clone();
        let outcome = self
            .asker
            .middleware(event, |event| async move {
                match fallback {
                    Some(handler) => handler.handle(event).await,
                    None => Ok(()),
                }
            })
            .await?;
        debug!(outcome = outcome.as_str(), "telegram update routed");
        Ok(outcome)
    }
}
