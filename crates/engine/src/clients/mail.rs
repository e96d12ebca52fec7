use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),
    #[error("delivery failed: {0}")]
    Delivery(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// Simulated delivery: the message is written to the log instead of being
/// handed to a mail transport.
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        if !to.contains('@') {
            return Err(MailError::InvalidRecipient(to.to_string()));
        }

        info!(
            from = %self.from,
            to = %to,
            subject = %subject,
            body_len = body.len(),
            "Simulated email delivery"
        );
        Ok(())
    }
}
