//! Seller Notification
//!
//! Best-effort "your item sold" message to the seller. A [`Notifier`] walks an
//! ordered list of [`NotificationChannel`]s and stops at the first success:
//!
//! 1. [`EmailJsApi`] - JSON call to the hosted e-mail API
//! 2. [`EmailJsForm`] - multipart form variant of the same API
//! 3. [`MailtoHandoff`] - prefilled `mailto:` URL handed back to the client
//!
//! The handoff cannot fail, so with it enabled the chain always produces a
//! [`NotificationReceipt`].

pub mod emailjs;
pub mod mailto;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::NotificationConfig;
use crate::market::{Identity, ItemSnapshot, School};

pub use emailjs::{EmailJsApi, EmailJsClient, EmailJsForm};
pub use mailto::MailtoHandoff;

/// Shown when the listing carries no school
pub const SCHOOL_NOT_SPECIFIED: &str = "Not specified";

/// Per-strategy failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rejected by provider: HTTP {status}")]
    Rejected { status: u16 },

    #[error("Channel disabled: {0}")]
    Disabled(&'static str),

    /// Every channel in the chain failed
    #[error("All {attempts} notification channels failed")]
    Exhausted { attempts: usize },
}

impl From<reqwest::Error> for NotifyError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => NotifyError::Rejected {
                status: status.as_u16(),
            },
            None => NotifyError::Transport(e.to_string()),
        }
    }
}

/// Everything a channel needs to tell a seller about one sale
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerNotice {
    pub seller: Identity,
    pub buyer: Identity,
    pub item: ItemSnapshot,
    pub school: School,
}

/// Template parameters understood by the hosted e-mail template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateParams {
    pub to_email: String,
    pub to_name: String,
    pub from_name: String,
    pub from_email: String,
    pub item_name: String,
    pub item_price: String,
    pub item_description: String,
    pub school_name: String,
}

impl SellerNotice {
    pub fn school_name(&self) -> &str {
        if self.school.is_specified() {
            self.school.as_str()
        } else {
            SCHOOL_NOT_SPECIFIED
        }
    }

    pub fn template_params(&self) -> TemplateParams {
        TemplateParams {
            to_email: self.seller.email.clone(),
            to_name: self.seller.name.clone(),
            from_name: self.buyer.name.clone(),
            from_email: self.buyer.email.clone(),
            item_name: self.item.name.clone(),
            item_price: self.item.price.to_string(),
            item_description: self.item.description.clone(),
            school_name: self.school_name().to_string(),
        }
    }
}

impl TemplateParams {
    /// Field name / value pairs, in template order
    pub fn fields(&self) -> [(&'static str, &str); 8] {
        [
            ("to_email", &self.to_email),
            ("to_name", &self.to_name),
            ("from_name", &self.from_name),
            ("from_email", &self.from_email),
            ("item_name", &self.item_name),
            ("item_price", &self.item_price),
            ("item_description", &self.item_description),
            ("school_name", &self.school_name),
        ]
    }
}

/// How the seller was (or will be) reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationReceipt {
    /// Provider accepted the message
    Sent { channel: String },
    /// Client should open this URL in the local mail composer
    Handoff { mailto_url: String },
}

/// One notification strategy
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, notice: &SellerNotice) -> Result<NotificationReceipt, NotifyError>;
}

/// Ordered fallback chain
pub struct Notifier {
    channels: Vec<Arc<dyn NotificationChannel>>,
    init_delay: Duration,
}

impl Notifier {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self {
            channels,
            init_delay: Duration::ZERO,
        }
    }

    /// Wait before the first attempt (the hosted client needs warm-up)
    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = delay;
        self
    }

    /// Build the chain from configuration.
    /// Remote channels are only added when enabled.
    pub fn from_config(config: &NotificationConfig) -> Result<Self, NotifyError> {
        let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();

        if config.api_enabled || config.form_enabled {
            let client = Arc::new(EmailJsClient::from_config(config)?);
            if config.api_enabled {
                channels.push(Arc::new(EmailJsApi::new(client.clone())));
            }
            if config.form_enabled {
                channels.push(Arc::new(EmailJsForm::new(client)));
            }
        }
        if config.mailto_enabled {
            channels.push(Arc::new(MailtoHandoff::new(&config.brand)));
        }

        info!(
            channels = ?channels.iter().map(|c| c.name()).collect::<Vec<_>>(),
            init_delay_ms = config.init_delay_ms,
            "Notifier configured"
        );

        Ok(Self::new(channels).with_init_delay(Duration::from_millis(config.init_delay_ms)))
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Try each channel in order and return the first receipt
    pub async fn notify(&self, notice: &SellerNotice) -> Result<NotificationReceipt, NotifyError> {
        if !self.init_delay.is_zero() {
            tokio::time::sleep(self.init_delay).await;
        }

        for channel in &self.channels {
            match channel.deliver(notice).await {
                Ok(receipt) => {
                    debug!(channel = channel.name(), seller = %notice.seller.id, "Seller notified");
                    return Ok(receipt);
                }
                Err(e) => {
                    warn!(
                        channel = channel.name(),
                        seller = %notice.seller.id,
                        error = %e,
                        "Notification channel failed, falling back"
                    );
                }
            }
        }

        Err(NotifyError::Exhausted {
            attempts: self.channels.len(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::mock::{MockChannel, sample_notice as notice};
    use super::*;

    #[test]
    fn test_template_params() {
        let params = notice(School::DUKE).template_params();
        assert_eq!(params.to_email, "sam@unc.edu");
        assert_eq!(params.from_name, "Bea Buyer");
        assert_eq!(params.item_price, "15.50");
        assert_eq!(params.school_name, "Duke");

        let params = notice("").template_params();
        assert_eq!(params.school_name, SCHOOL_NOT_SPECIFIED);
    }

    #[tokio::test]
    async fn test_first_success_stops_chain() {
        let first = Arc::new(MockChannel::failing("first"));
        let second = Arc::new(MockChannel::ok("second"));
        let third = Arc::new(MockChannel::ok("third"));
        let notifier = Notifier::new(vec![first.clone(), second.clone(), third.clone()]);

        let receipt = notifier.notify(&notice(School::DUKE)).await.unwrap();

        assert_eq!(
            receipt,
            NotificationReceipt::Sent {
                channel: "second".to_string()
            }
        );
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
        assert_eq!(third.calls(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_chain() {
        let notifier = Notifier::new(vec![
            Arc::new(MockChannel::failing("a")),
            Arc::new(MockChannel::failing("b")),
        ]);

        let err = notifier.notify(&notice("")).await.unwrap_err();
        assert_eq!(err, NotifyError::Exhausted { attempts: 2 });
    }

    #[test]
    fn test_from_config_default_is_handoff_only() {
        let notifier = Notifier::from_config(&NotificationConfig::default()).unwrap();
        assert_eq!(notifier.channel_names(), vec!["mailto"]);
    }
}
