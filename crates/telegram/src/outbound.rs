use std::{future::Future, time::Duration};

use {
    anyhow::Result,
    async_trait::async_trait,
    teloxide::{RequestError, prelude::*, types::ChatId},
    tracing::warn,
};

use fedlink_relay::ChatSender;

/// Extra retries on top of the relay-level policy, only for Telegram's own
/// rate-limit responses which carry an explicit wait time.
const RETRY_AFTER_MAX_RETRIES: usize = 4;

/// Outbound message sender for Telegram.
pub struct TelegramSender {
    bot: Bot,
}

impl TelegramSender {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    async fn run_with_retry<T, F, Fut>(
        &self,
        chat_id: &str,
        operation: &'static str,
        mut request: F,
    ) -> std::result::Result<T, RequestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, RequestError>>,
    {
        let mut retries = 0usize;

        loop {
            match request().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let Some(wait) = retry_after_duration(&err) else {
                        return Err(err);
                    };

                    if retries >= RETRY_AFTER_MAX_RETRIES {
                        warn!(
                            chat_id,
                            operation,
                            retries,
                            retry_after_secs = wait.as_secs(),
                            "telegram rate limit persisted after retries"
                        );
                        return Err(err);
                    }

                    retries += 1;
                    warn!(
                        chat_id,
                        operation,
                        retries,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limited, waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                },
            }
        }
    }
}

#[async_trait]
impl ChatSender for TelegramSender {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()> {
        let chat = ChatId(chat_id.parse::<i64>()?);
        self.run_with_retry(chat_id, "send message", || {
            let req = self.bot.send_message(chat, text);
            async move { req.await }
        })
        .await?;
        Ok(())
    }
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_duration_extracts_wait() {
        let err = RequestError::RetryAfter(teloxide::types::Seconds::from_seconds(42));
        assert_eq!(retry_after_duration(&err), Some(Duration::from_secs(42)));
    }

    #[test]
    fn retry_after_duration_ignores_other_errors() {
        let err = RequestError::Io(std::io::Error::other("boom").into());
        assert_eq!(retry_after_duration(&err), None);
    }

    #[tokio::test]
    async fn non_numeric_chat_id_is_rejected() {
        let sender = TelegramSender::new(Bot::new("test:fake_token_for_unit_tests"));
        let result = sender.send_text("not-a-number", "hi").await;
        assert!(result.is_err());
    }
}
