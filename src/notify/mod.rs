//! Telegram delivery of "new items" messages.
//!
//! Messages use Telegram's HTML parse mode, limited to `<b>` and `<pre>`.
//! Delivery is best effort: one attempt, failures are logged and reported
//! back as `false`, never retried.

use crate::error::NotifyError;
use crate::models::Item;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

pub const TELEGRAM_API: &str = "https://api.telegram.org";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Anything that can deliver a rendered text message
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn deliver(&self, text: &str) -> Result<(), NotifyError>;
}

pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, chat_id: &str) -> Result<Self> {
        Self::with_api_base(TELEGRAM_API, bot_token, chat_id)
    }

    pub fn with_api_base(api_base: &str, bot_token: &str, chat_id: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

#[async_trait]
impl MessageSink for TelegramNotifier {
    async fn deliver(&self, text: &str) -> Result<(), NotifyError> {
        let form = [
            ("chat_id", self.chat_id.as_str()),
            ("text", text),
            ("parse_mode", "HTML"),
        ];

        let response = self.client.post(self.endpoint()).form(&form[..]).send().await?;

        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status()));
        }
        Ok(())
    }
}

/// Stands in for the notifier when it could not be built, so the run still saves
pub struct UnavailableSink {
    pub(crate) reason: String,
}

#[async_trait]
impl MessageSink for UnavailableSink {
    async fn deliver(&self, _text: &str) -> Result<(), NotifyError> {
        Err(NotifyError::Unavailable(self.reason.clone()))
    }
}

/// Telegram sink for the run, or an [`UnavailableSink`] when the HTTP client can't be set up
pub fn telegram_sink(bot_token: &str, chat_id: &str) -> Box<dyn MessageSink> {
    match TelegramNotifier::new(bot_token, chat_id) {
        Ok(notifier) => Box::new(notifier),
        Err(err) => {
            warn!("Telegram notifications disabled: {:#}", err);
            Box::new(UnavailableSink {
                reason: format!("{:#}", err),
            })
        }
    }
}

/// Escape the characters Telegram's HTML mode would treat as markup
pub fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// One message announcing `new_items` for `city`, one block per item
pub fn render_message(city: &str, new_items: &[Item]) -> String {
    let mut message = format!("<b>New items in {}: {}</b>\n\n", city, new_items.len());
    for (idx, item) in new_items.iter().enumerate() {
        message.push_str(&format!(
            "<b>{}. New item:</b>\n<pre>{}</pre>\n\n",
            idx + 1,
            escape_html(&item.display_text)
        ));
    }
    message
}

/// Render and deliver the announcement for one city. Returns whether it went out.
pub async fn notify_city(sink: &dyn MessageSink, city: &str, new_items: &[Item]) -> bool {
    let message = render_message(city, new_items);
    match sink.deliver(&message).await {
        Ok(()) => {
            info!("Notified {} new items in {}", new_items.len(), city);
            true
        }
        Err(err) => {
            warn!("Failed to notify new items in {}: {}", city, err);
            false
        }
    }
}
