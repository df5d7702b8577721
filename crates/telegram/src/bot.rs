use std::{sync::Arc, time::Duration};

use {
    secrecy::ExposeSecret,
    teloxide::{ApiError, RequestError, prelude::*, types::AllowedUpdate},
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use promptline_questions::Asker;

use crate::{
    config::TelegramConfig,
    error::{Error, Result},
    event::TelegramEvent,
    handlers::{QuestionRouter, UpdateHandler},
};

/// Build an [`Asker`] for Telegram events from the configured global rules.
pub fn build_asker(config: &TelegramConfig) -> Result<Asker<TelegramEvent>> {
    Ok(Asker::builder().config(&config.questions)?.build())
}

/// Start long polling for a bot.
///
/// Every update is routed through `asker`; updates no pending question
/// consumes go to `fallback`. Polling runs in a background task until the
/// returned `CancellationToken` is cancelled.
pub async fn start_polling(
    config: TelegramConfig,
    asker: Arc<Asker<TelegramEvent>>,
    fallback: Option<Arc<dyn UpdateHandler>>,
) -> Result<CancellationToken> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(config.client_timeout())
        .build()
        .map_err(|e| Error::external("building telegram http client", e))?;
    let bot = Bot::with_client(config.token.expose_secret(), client);

    // Verify credentials and learn the bot id used in conversation keys.
    let me = bot.get_me().await?;
    let bot_id = me.id;

    // Delete any existing webhook so long polling works.
    bot.delete_webhook().send().await?;

    info!(
        bot_id = bot_id.0,
        username = ?me.username,
        "telegram bot connected (webhook cleared)"
    );

    let mut router = QuestionRouter::new(asker, bot_id);
    if let Some(fallback) = fallback {
        router = router.with_fallback(fallback);
    }

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        info!(bot_id = bot_id.0, "starting telegram polling loop");
        let mut offset: i32 = 0;

        loop {
            let result = tokio::select! {
                () = cancel_clone.cancelled() => {
                    info!(bot_id = bot_id.0, "telegram polling stopped");
                    break;
                },
                result = bot
                    .get_updates()
                    .offset(offset)
                    .timeout(config.poll_timeout_secs)
                    .allowed_updates(vec![
                        AllowedUpdate::Message,
                        AllowedUpdate::EditedMessage,
                        AllowedUpdate::CallbackQuery,
                    ])
                    .send() => result,
            };

            match result {
                Ok(updates) => {
                    debug!(count = updates.len(), "got telegram updates");
                    for update in updates {
                        offset = update.id.as_offset();
                        if let Err(e) = router.route(update).await {
                            error!(error = %e, "error handling telegram update");
                        }
                    }
                },
                Err(e) => {
                    // Another instance is polling with the same token.
                    if matches!(&e, RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) {
                        warn!(
                            bot_id = bot_id.0,
                            "telegram polling disabled: another instance is already running with this token"
                        );
                        cancel_clone.cancel();
                        break;
                    }

                    warn!(error = %e, "telegram getUpdates failed");
                    tokio::time::sleep(Duration::from_secs(config.retry_delay_secs)).await;
                },
            }
        }
    });

    Ok(cancel)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn build_asker_installs_configured_cancel_rule() {
        let mut config = TelegramConfig::default();
        config.questions = promptline_questions::AskerConfig::from_toml_str(
            "[cancel]\nhears_regex = [\"(?i)^stop$\"]\n",
        )
        .unwrap();
        assert!(build_asker(&config).is_ok());
    }

    #[test]
    fn build_asker_rejects_bad_pattern() {
        let mut config = TelegramConfig::default();
        config.questions =
            promptline_questions::AskerConfig::from_toml_str("[cancel]\nhears_regex = [\"(\"]\n")
                .unwrap();
        let Err(err) = build_asker(&config) else {
            panic!("invalid regex must be rejected");
        };
        assert!(matches!(
            err,
            Error::Questions(promptline_questions::Error::InvalidPattern { .. })
        ));
    }
}
