//! Outbound SMS / WhatsApp messages.
//!
//! Messages are pushed onto an unbounded queue and delivered by a single
//! background worker, so request handlers never wait on the provider.

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use strum::{Display, EnumString};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, error, info, warn};

use crate::config::Config;

const MAX_ATTEMPTS: u32 = 3;
const MIN_PHONE_DIGITS: usize = 8;
const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Channel {
    Sms,
    Whatsapp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub to: String,
    pub channel: Channel,
    pub body: String,
}

/// Normalizes a phone number to `+<country><number>`.
///
/// Separators are dropped, a `00` prefix becomes `+` and a single leading
/// `0` is replaced by `default_country_code`. Returns `None` when fewer than
/// eight digits remain.
pub fn normalize_phone(raw: &str, default_country_code: &str) -> Option<String> {
    let trimmed = raw.trim();
    let has_plus = trimmed.starts_with('+');
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();

    let international = if has_plus {
        digits
    } else if let Some(rest) = digits.strip_prefix("00") {
        rest.to_string()
    } else if let Some(rest) = digits.strip_prefix('0') {
        format!("{}{}", default_country_code.trim_start_matches('+'), rest)
    } else {
        digits
    };

    if international.len() < MIN_PHONE_DIGITS {
        return None;
    }

    Some(format!("+{international}"))
}

pub fn task_assigned_message(task_title: &str, deadline: Option<NaiveDate>) -> String {
    match deadline {
        Some(d) => format!("New task assigned: \"{task_title}\" (due {d})."),
        None => format!("New task assigned: \"{task_title}\"."),
    }
}

pub fn task_overdue_message(task_title: &str, deadline: NaiveDate) -> String {
    format!("Task \"{task_title}\" is overdue (deadline was {deadline}).")
}

pub fn task_due_soon_message(task_title: &str, deadline: NaiveDate) -> String {
    format!("Reminder: task \"{task_title}\" is due on {deadline}.")
}

pub fn absence_reviewed_message(approved: bool, start: NaiveDate, end: NaiveDate) -> String {
    let verdict = if approved { "approved" } else { "rejected" };
    format!("Your absence request from {start} to {end} has been {verdict}.")
}

/// HTTP client for the messaging provider.
#[derive(Clone)]
pub struct MessagingClient {
    client: Client,
    provider_url: Option<String>,
    api_key: Option<String>,
    sender: String,
}

impl MessagingClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            provider_url: config.messaging_provider_url.clone(),
            api_key: config.messaging_api_key.clone(),
            sender: config.messaging_sender.clone(),
        })
    }

    pub async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        let Some(url) = self.provider_url.as_deref() else {
            info!(
                to = %notification.to,
                channel = %notification.channel,
                "Messaging provider not configured, message dropped"
            );
            return Ok(());
        };

        let payload = json!({
            "from": self.sender,
            "to": notification.to,
            "channel": notification.channel,
            "body": notification.body,
        });

        let mut delay = Duration::from_secs(1);

        for attempt in 1..=MAX_ATTEMPTS {
            let mut request = self.client.post(url).json(&payload);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(to = %notification.to, attempt, "Message delivered");
                    return Ok(());
                }
                Ok(response) => {
                    warn!(status = %response.status(), attempt, "Messaging provider rejected message");
                    if attempt == MAX_ATTEMPTS {
                        anyhow::bail!(
                            "provider returned {} after {} attempts",
                            response.status(),
                            MAX_ATTEMPTS
                        );
                    }
                }
                Err(e) => {
                    warn!(error = %e, attempt, "Messaging provider unreachable");
                    if attempt == MAX_ATTEMPTS {
                        return Err(e.into());
                    }
                }
            }

            tokio::time::sleep(delay).await;
            delay *= 2;
        }

        Ok(())
    }
}

/// Handle used by handlers and jobs to queue messages.
#[derive(Clone)]
pub struct NotificationQueue {
    sender: UnboundedSender<Notification>,
    channel: Channel,
    default_country_code: String,
}

impl NotificationQueue {
    /// Creates the queue and the receiver its worker drains.
    pub fn new(channel: Channel, default_country_code: &str) -> (Self, UnboundedReceiver<Notification>) {
        let (sender, receiver) = unbounded_channel();
        (
            Self {
                sender,
                channel,
                default_country_code: default_country_code.to_string(),
            },
            receiver,
        )
    }

    /// Queues a message for `phone`. Invalid or missing numbers are logged
    /// and skipped. Returns whether the message was queued.
    pub fn enqueue(&self, phone: Option<&str>, body: String) -> bool {
        let Some(raw) = phone else {
            debug!("Recipient has no phone number, notification skipped");
            return false;
        };

        let Some(to) = normalize_phone(raw, &self.default_country_code) else {
            warn!(phone = %raw, "Invalid phone number, notification skipped");
            return false;
        };

        let notification = Notification {
            to,
            channel: self.channel,
            body,
        };

        if let Err(e) = self.sender.send(notification) {
            error!(error = %e, "Notification worker is gone, message lost");
            return false;
        }
        true
    }
}

/// Drains the queue until every sender is dropped.
pub async fn run_worker(client: MessagingClient, mut receiver: UnboundedReceiver<Notification>) {
    info!("Notification worker started");

    while let Some(notification) = receiver.recv().await {
        if let Err(e) = client.send(&notification).await {
            error!(error = %e, to = %notification.to, "Failed to deliver notification");
        }
    }

    info!("Notification worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn normalizes_local_and_international_numbers() {
        assert_eq!(normalize_phone("06 12 34 56 78", "212"), Some("+212612345678".into()));
        assert_eq!(normalize_phone("+212-612-345-678", "212"), Some("+212612345678".into()));
        assert_eq!(normalize_phone("0033612345678", "212"), Some("+33612345678".into()));
        assert_eq!(normalize_phone("0612", "212"), None);
        assert_eq!(normalize_phone("", "212"), None);
    }

    #[test]
    fn channel_parses_case_insensitively() {
        assert_eq!(Channel::from_str("WhatsApp").unwrap(), Channel::Whatsapp);
        assert_eq!(Channel::Sms.to_string(), "sms");
        assert!(Channel::from_str("pigeon").is_err());
    }

    #[tokio::test]
    async fn enqueue_delivers_normalized_message() {
        let (queue, mut receiver) = NotificationQueue::new(Channel::Sms, "212");

        assert!(queue.enqueue(Some("0612345678"), "hello".into()));
        assert!(!queue.enqueue(None, "nobody".into()));
        assert!(!queue.enqueue(Some("12"), "bad".into()));

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.to, "+212612345678");
        assert_eq!(received.body, "hello");
        assert!(receiver.try_recv().is_err());
    }
}
