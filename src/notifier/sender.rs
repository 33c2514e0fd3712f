//! Messaging-channel client.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Serialize;
use tracing::{error, warn};

use crate::error::SendError;
use crate::runtime::{self, Shutdown};
use crate::settings::NotifierSettings;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_PAUSE: Duration = Duration::from_secs(1);

pub trait MessageSender {
    fn send(&self, text: &str) -> Result<(), SendError>;
}

#[derive(Serialize)]
struct SendMessageBody<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

/// Posts messages to a channel through the bot HTTP API.
pub struct TelegramSender {
    http: Client,
    url: String,
    channel_id: String,
}

impl TelegramSender {
    pub fn new(settings: &NotifierSettings) -> Result<Self, SendError> {
        Ok(Self {
            http: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            url: format!(
                "{}/bot{}/sendMessage",
                settings.api_base.trim_end_matches('/'),
                settings.bot_token
            ),
            channel_id: settings.channel_id.clone(),
        })
    }
}

impl MessageSender for TelegramSender {
    fn send(&self, text: &str) -> Result<(), SendError> {
        let response = self
            .http
            .post(&self.url)
            .json(&SendMessageBody {
                chat_id: &self.channel_id,
                text,
                parse_mode: "MarkdownV2",
                disable_web_page_preview: true,
            })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(SendError::Api {
                status: status.as_u16(),
                description: response.text().unwrap_or_default(),
            });
        }
        Ok(())
    }
}

/// Sends with bounded retries. Returns `true` on success; after exhausting
/// the retries the message is given up on and only logged.
pub fn send_with_retries(
    sender: &dyn MessageSender,
    shutdown: &Shutdown,
    text: &str,
    max_retries: u32,
) -> bool {
    let attempts = max_retries.max(1);
    for attempt in 1..=attempts {
        if shutdown.is_requested() {
            return false;
        }
        match sender.send(text) {
            Ok(()) => return true,
            Err(e) => {
                warn!(attempt, attempts, error = %e, "Failed to send message");
                if attempt < attempts {
                    runtime::sleep_with_quantum(shutdown, RETRY_PAUSE, RETRY_PAUSE);
                }
            }
        }
    }
    error!(attempts, "Giving up on message after all retries");
    false
}
